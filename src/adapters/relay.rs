//! Relay board adapter for the fan port.
//!
//! Generic over [`embedded_hal::digital::OutputPin`], so the same driving
//! logic runs against ESP-IDF pin drivers on the device and against mock
//! pins on the host. The relay board is active-low: driving a GPIO low
//! energizes the coil. The indicator LED shares this adapter because both
//! live on plain GPIOs.

use embedded_hal::digital::OutputPin;

use crate::app::ports::FanPort;
use crate::config::NUM_RELAYS;
use crate::drivers::status_led::PulsePattern;

/// Coil is energized when the pin is driven low.
const RELAY_ON: bool = false;

pub struct RelayFan<P: OutputPin> {
    channels: [P; NUM_RELAYS],
    led: P,
    pattern: PulsePattern,
}

impl<P: OutputPin> RelayFan<P> {
    /// Take over the relay and LED pins, releasing every coil.
    pub fn new(mut channels: [P; NUM_RELAYS], led: P) -> Result<Self, P::Error> {
        for ch in &mut channels {
            ch.set_state((!RELAY_ON).into())?;
        }
        Ok(Self {
            channels,
            led,
            pattern: PulsePattern::new(),
        })
    }

    /// Advance the LED pulse pattern by one tick.
    pub fn tick_led(&mut self, dt_ms: u32) {
        let lit = self.pattern.tick(dt_ms);
        let _ = self.led.set_state(lit.into());
    }
}

impl<P: OutputPin> FanPort for RelayFan<P> {
    fn set_channel(&mut self, index: usize, active: bool) {
        let Some(pin) = self.channels.get_mut(index) else {
            return;
        };
        let level = active == RELAY_ON;
        let _ = pin.set_state(level.into());
    }

    fn set_connectivity_indicator(&mut self, level: u8) {
        self.pattern.set_level(level);
    }
}

/// Records channel and indicator state for host tests.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimFan {
    pub channels: [bool; NUM_RELAYS],
    pub indicator: u8,
}

#[cfg(not(target_os = "espidf"))]
impl FanPort for SimFan {
    fn set_channel(&mut self, index: usize, active: bool) {
        if let Some(ch) = self.channels.get_mut(index) {
            *ch = active;
        }
    }

    fn set_connectivity_indicator(&mut self, level: u8) {
        self.indicator = level;
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Remembers the last level written, wired-low initially.
    #[derive(Debug, Default, Clone, Copy)]
    struct MockPin {
        high: bool,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    #[test]
    fn construction_releases_every_coil() {
        let fan = RelayFan::new([MockPin::default(); NUM_RELAYS], MockPin::default()).unwrap();
        // Active-low board: released means driven high.
        assert!(fan.channels.iter().all(|p| p.high));
    }

    #[test]
    fn active_channel_is_driven_low() {
        let mut fan =
            RelayFan::new([MockPin::default(); NUM_RELAYS], MockPin::default()).unwrap();
        fan.set_channel(1, true);
        assert!(fan.channels[0].high);
        assert!(!fan.channels[1].high);
        assert!(fan.channels[2].high);
        fan.set_channel(1, false);
        assert!(fan.channels[1].high);
    }

    #[test]
    fn out_of_range_channel_is_ignored() {
        let mut fan =
            RelayFan::new([MockPin::default(); NUM_RELAYS], MockPin::default()).unwrap();
        fan.set_channel(7, true);
        assert!(fan.channels.iter().all(|p| p.high));
    }

    #[test]
    fn led_follows_the_pulse_pattern() {
        let mut fan =
            RelayFan::new([MockPin::default(); NUM_RELAYS], MockPin::default()).unwrap();
        fan.set_connectivity_indicator(3);
        fan.tick_led(100);
        assert!(fan.led.high);
        fan.tick_led(300);
        assert!(!fan.led.high);
    }
}
