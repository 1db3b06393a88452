//! Device configuration parameters
//!
//! All tunable parameters for the Gale fan controller.
//! Values can be overridden via NVS; the defaults match a typical adult
//! training setup with three normally-open relay channels.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::hr::zones::ZoneThresholds;

/// Number of relay output channels (one per fan speed).
pub const NUM_RELAYS: usize = 3;

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Heart rate ---
    /// Maximum heart rate (BPM)
    pub hr_max: u8,
    /// Resting heart rate (BPM)
    pub hr_resting: u8,

    // --- Zone thresholds (as fractions) ---
    /// Zone 1 threshold, fraction of HR reserve
    pub zone1_percent: f32,
    /// Zone 2 threshold, fraction of max HR
    pub zone2_percent: f32,
    /// Zone 3 threshold, fraction of max HR
    pub zone3_percent: f32,

    // --- Fan behaviour ---
    /// Speed held when BPM is below zone 1 (0 = fan off)
    pub always_on_floor: u8,
    /// Delay before lowering speed, and the disconnect grace period (ms)
    pub fan_delay_ms: u32,
    /// BPM margin required below a zone boundary before downgrading
    pub hysteresis_bpm: u8,

    // --- Outputs ---
    /// Relay GPIO numbers, one per speed (index 0 = speed 1)
    pub relay_gpio: [u8; NUM_RELAYS],
    /// Connectivity indicator LED GPIO number
    pub led_gpio: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // Heart rate
            hr_max: 200,
            hr_resting: 50,

            // Zones
            zone1_percent: 0.4, // 40% of HR reserve
            zone2_percent: 0.7, // 70% of max HR
            zone3_percent: 0.8, // 80% of max HR

            // Fan behaviour
            always_on_floor: 1,
            fan_delay_ms: 120_000, // 2 minutes
            hysteresis_bpm: 15,

            // Outputs
            relay_gpio: [25, 26, 27],
            led_gpio: 2,
        }
    }
}

impl DeviceConfig {
    /// Range-check every field and the derived zone thresholds.
    ///
    /// Invalid configs are rejected with [`ConfigError::ValidationFailed`],
    /// never silently clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hr_resting >= self.hr_max {
            return Err(ConfigError::ValidationFailed(
                "hr_resting must be below hr_max",
            ));
        }
        for (pct, name) in [
            (self.zone1_percent, "zone1_percent must be in (0, 1]"),
            (self.zone2_percent, "zone2_percent must be in (0, 1]"),
            (self.zone3_percent, "zone3_percent must be in (0, 1]"),
        ] {
            if !(pct > 0.0 && pct <= 1.0) {
                return Err(ConfigError::ValidationFailed(name));
            }
        }
        if self.always_on_floor > 3 {
            return Err(ConfigError::ValidationFailed(
                "always_on_floor must be 0..=3",
            ));
        }
        let thresholds = ZoneThresholds::from_config(self);
        if !thresholds.is_monotonic() {
            return Err(ConfigError::ValidationFailed(
                "derived zone thresholds must be strictly increasing",
            ));
        }
        Ok(())
    }
}
