//! Training-zone threshold derivation.
//!
//! Zone 1 uses the Karvonen method (resting rate plus a fraction of heart
//! rate reserve); zones 2 and 3 are plain fractions of maximum heart rate.
//! The thresholds are recomputed whenever the device configuration changes.

use crate::config::DeviceConfig;

/// Derived BPM thresholds for the three fan-speed zones.
///
/// Invariant: `zone1 < zone2 < zone3`, enforced by
/// [`DeviceConfig::validate`](crate::config::DeviceConfig::validate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneThresholds {
    /// Fan switches on at this BPM.
    pub zone1: f32,
    /// Second speed threshold.
    pub zone2: f32,
    /// Third speed threshold.
    pub zone3: f32,
}

impl ZoneThresholds {
    /// Derive the three thresholds from the heart-rate configuration.
    pub fn from_config(cfg: &DeviceConfig) -> Self {
        let reserve = f32::from(cfg.hr_max) - f32::from(cfg.hr_resting);
        Self {
            zone1: f32::from(cfg.hr_resting) + cfg.zone1_percent * reserve,
            zone2: cfg.zone2_percent * f32::from(cfg.hr_max),
            zone3: cfg.zone3_percent * f32::from(cfg.hr_max),
        }
    }

    /// True when the thresholds are strictly increasing.
    pub fn is_monotonic(&self) -> bool {
        self.zone1 < self.zone2 && self.zone2 < self.zone3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_setup() {
        let cfg = DeviceConfig {
            hr_max: 200,
            hr_resting: 50,
            zone1_percent: 0.4,
            zone2_percent: 0.7,
            zone3_percent: 0.8,
            ..Default::default()
        };
        let t = ZoneThresholds::from_config(&cfg);
        assert!((t.zone1 - 110.0).abs() < 0.001);
        assert!((t.zone2 - 140.0).abs() < 0.001);
        assert!((t.zone3 - 160.0).abs() < 0.001);
        assert!(t.is_monotonic());
    }

    #[test]
    fn zone1_tracks_reserve_not_max() {
        // Same max, higher resting rate: zone 1 rises, zones 2/3 unchanged.
        let low = ZoneThresholds::from_config(&DeviceConfig {
            hr_resting: 40,
            ..Default::default()
        });
        let high = ZoneThresholds::from_config(&DeviceConfig {
            hr_resting: 70,
            ..Default::default()
        });
        assert!(high.zone1 > low.zone1);
        assert!((high.zone2 - low.zone2).abs() < 0.001);
        assert!((high.zone3 - low.zone3).abs() < 0.001);
    }

    #[test]
    fn detects_inverted_thresholds() {
        let t = ZoneThresholds {
            zone1: 150.0,
            zone2: 140.0,
            zone3: 160.0,
        };
        assert!(!t.is_monotonic());
    }
}
