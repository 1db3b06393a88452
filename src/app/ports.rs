//! Ports the application core consumes.
//!
//! Hardware and storage stay behind these traits; adapters implement them
//! per platform and the tests substitute simulators.

use core::fmt;

use crate::config::DeviceConfig;

use super::events::AppEvent;

/// Relay channels plus the connectivity indicator LED.
pub trait FanPort {
    /// Energize or release one relay channel.
    fn set_channel(&mut self, index: usize, active: bool);

    /// Set the indicator level: 0 for off, otherwise the current fan
    /// speed, which selects the pulse rate.
    fn set_connectivity_indicator(&mut self, level: u8);
}

/// Persistent configuration storage.
pub trait ConfigPort {
    fn load(&mut self) -> Result<DeviceConfig, ConfigError>;
    fn save(&mut self, cfg: &DeviceConfig) -> Result<(), ConfigError>;
}

/// Consumer of application events, for logging or an external surface.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// Configuration storage and validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Nothing stored yet.
    NotFound,
    /// Stored blob did not deserialize.
    Corrupted,
    /// Values rejected by [`DeviceConfig::validate`].
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound => write!(f, "no stored configuration"),
            ConfigError::Corrupted => write!(f, "stored configuration is corrupted"),
            ConfigError::ValidationFailed(why) => write!(f, "invalid configuration: {why}"),
            ConfigError::StorageFull => write!(f, "configuration storage is full"),
            ConfigError::IoError => write!(f, "configuration storage i/o error"),
        }
    }
}

impl std::error::Error for ConfigError {}
