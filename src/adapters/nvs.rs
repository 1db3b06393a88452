//! Config persistence in non-volatile storage.
//!
//! The configuration is stored as one postcard blob under a fixed key, so
//! a partial write can never leave mixed old and new fields behind.

pub const NVS_NAMESPACE: &str = "gale";
pub const CONFIG_KEY: &str = "devcfg";

/// Upper bound on the serialized config size.
pub const MAX_BLOB_LEN: usize = 128;

#[cfg(target_os = "espidf")]
mod espidf {
    use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
    use log::{info, warn};

    use crate::app::ports::{ConfigError, ConfigPort};
    use crate::config::DeviceConfig;

    use super::{CONFIG_KEY, MAX_BLOB_LEN, NVS_NAMESPACE};

    pub struct NvsConfigStore {
        nvs: EspNvs<NvsDefault>,
    }

    impl NvsConfigStore {
        pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, ConfigError> {
            let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)
                .map_err(|_| ConfigError::IoError)?;
            Ok(Self { nvs })
        }
    }

    impl ConfigPort for NvsConfigStore {
        fn load(&mut self) -> Result<DeviceConfig, ConfigError> {
            let mut buf = [0u8; MAX_BLOB_LEN];
            let blob = self
                .nvs
                .get_blob(CONFIG_KEY, &mut buf)
                .map_err(|_| ConfigError::IoError)?
                .ok_or(ConfigError::NotFound)?;
            let cfg: DeviceConfig = postcard::from_bytes(blob).map_err(|e| {
                warn!("stored config blob rejected: {e}");
                ConfigError::Corrupted
            })?;
            cfg.validate()?;
            info!("configuration loaded from nvs");
            Ok(cfg)
        }

        fn save(&mut self, cfg: &DeviceConfig) -> Result<(), ConfigError> {
            let mut buf = [0u8; MAX_BLOB_LEN];
            let blob = postcard::to_slice(cfg, &mut buf)
                .map_err(|_| ConfigError::StorageFull)?;
            self.nvs
                .set_blob(CONFIG_KEY, blob)
                .map_err(|_| ConfigError::IoError)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::NvsConfigStore;

/// In-memory store for host tests, same blob encoding as the device.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimConfigStore {
    blob: Option<Vec<u8>>,
    pub save_count: usize,
    /// When set, the next save fails with this error.
    pub fail_next_save: Option<crate::app::ports::ConfigError>,
}

#[cfg(not(target_os = "espidf"))]
impl crate::app::ports::ConfigPort for SimConfigStore {
    fn load(&mut self) -> Result<crate::config::DeviceConfig, crate::app::ports::ConfigError> {
        use crate::app::ports::ConfigError;
        let blob = self.blob.as_deref().ok_or(ConfigError::NotFound)?;
        let cfg: crate::config::DeviceConfig =
            postcard::from_bytes(blob).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn save(
        &mut self,
        cfg: &crate::config::DeviceConfig,
    ) -> Result<(), crate::app::ports::ConfigError> {
        if let Some(err) = self.fail_next_save.take() {
            return Err(err);
        }
        let blob = postcard::to_allocvec(cfg)
            .map_err(|_| crate::app::ports::ConfigError::StorageFull)?;
        self.blob = Some(blob);
        self.save_count += 1;
        Ok(())
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::app::ports::{ConfigError, ConfigPort};
    use crate::config::DeviceConfig;

    #[test]
    fn save_then_load_roundtrips() {
        let mut store = SimConfigStore::default();
        let cfg = DeviceConfig {
            hysteresis_bpm: 12,
            ..Default::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), cfg);
    }

    #[test]
    fn empty_store_reports_not_found() {
        let mut store = SimConfigStore::default();
        assert_eq!(store.load().unwrap_err(), ConfigError::NotFound);
    }

    #[test]
    fn corrupted_blob_is_rejected() {
        let mut store = SimConfigStore::default();
        store.blob = Some(vec![0xFF]);
        assert_eq!(store.load().unwrap_err(), ConfigError::Corrupted);
    }

    #[test]
    fn serialized_config_fits_the_blob_bound() {
        let blob = postcard::to_allocvec(&DeviceConfig::default()).unwrap();
        assert!(blob.len() <= MAX_BLOB_LEN);
    }
}
