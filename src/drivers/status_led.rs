//! Status LED pulse engine.
//!
//! The LED blinks faster as the fan spins faster: a full on/off period of
//! 3000 ms at speed 1, 1500 ms at speed 2, 750 ms at speed 3, and solid
//! off at level 0. Pure timing logic; the GPIO write happens in the relay
//! adapter.

/// Full blink periods per level, index 0 unused.
const PERIOD_MS: [u32; 4] = [0, 3_000, 1_500, 750];

#[derive(Debug)]
pub struct PulsePattern {
    level: u8,
    phase_ms: u32,
}

impl PulsePattern {
    pub const fn new() -> Self {
        Self {
            level: 0,
            phase_ms: 0,
        }
    }

    /// Change the pulse level, restarting the phase so a level change is
    /// visible immediately.
    pub fn set_level(&mut self, level: u8) {
        let level = level.min(3);
        if level != self.level {
            self.level = level;
            self.phase_ms = 0;
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Advance by `dt_ms` and return whether the LED should be lit.
    pub fn tick(&mut self, dt_ms: u32) -> bool {
        if self.level == 0 {
            return false;
        }
        let period = PERIOD_MS[usize::from(self.level)];
        self.phase_ms = (self.phase_ms + dt_ms) % period;
        // Lit for the first half of the period.
        self.phase_ms < period / 2
    }
}

impl Default for PulsePattern {
    fn default() -> Self {
        Self::new()
    }
}
