//! Debounced fan actuator.
//!
//! Owns the requested/applied speed pair and decides when a requested
//! change actually reaches the relays. Increases apply immediately;
//! decreases are held until `fan_delay_ms` has elapsed since the last
//! applied change, so a brief dip in heart rate does not cycle the fan.
//! A disconnect watchdog forces the speed down to the always-on floor
//! once the link has been gone longer than the same delay.

use crate::app::ports::FanPort;
use crate::config::{DeviceConfig, NUM_RELAYS};

/// Mutable speed state, advanced from the poll loop only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedState {
    /// Speed the decision engine wants.
    pub current_speed: u8,
    /// Speed last driven onto the relays.
    pub applied_speed: u8,
    /// Timestamp of the last applied change, in monotonic milliseconds.
    pub last_change_ms: u64,
    /// Timestamp of the last link loss.
    pub last_disconnect_ms: u64,
    /// Whether a sensor link is currently up.
    pub connected: bool,
    /// Whether an external override pins the speed.
    pub override_active: bool,
}

impl SpeedState {
    const fn new() -> Self {
        Self {
            current_speed: 0,
            applied_speed: 0,
            last_change_ms: 0,
            last_disconnect_ms: 0,
            connected: false,
            override_active: false,
        }
    }
}

/// Drives relay channels from requested speeds with decrease debouncing.
#[derive(Debug)]
pub struct FanActuator {
    state: SpeedState,
    fan_delay_ms: u32,
    floor: u8,
}

impl FanActuator {
    pub fn new(cfg: &DeviceConfig) -> Self {
        Self {
            state: SpeedState::new(),
            fan_delay_ms: cfg.fan_delay_ms,
            floor: cfg.always_on_floor,
        }
    }

    pub fn state(&self) -> &SpeedState {
        &self.state
    }

    /// Pick up new delay and floor values after a config change.
    pub fn reconfigure(&mut self, cfg: &DeviceConfig) {
        self.fan_delay_ms = cfg.fan_delay_ms;
        self.floor = cfg.always_on_floor;
    }

    /// Record a new requested speed. The relays are only touched from
    /// [`poll`](Self::poll); this just updates the request and, when it
    /// differs from the current request, the change timestamp used for
    /// decrease debouncing.
    pub fn request(&mut self, speed: u8, now_ms: u64) {
        let speed = speed.min(3);
        if speed != self.state.current_speed {
            self.state.current_speed = speed;
            self.state.last_change_ms = now_ms;
        }
    }

    /// Apply a speed immediately, bypassing the debounce. Used for
    /// external overrides.
    pub fn force_apply<F: FanPort>(&mut self, speed: u8, now_ms: u64, fan: &mut F) {
        let speed = speed.min(3);
        self.state.current_speed = speed;
        self.drive(speed, now_ms, fan);
    }

    pub fn set_override(&mut self, active: bool) {
        self.state.override_active = active;
    }

    pub fn link_up(&mut self) {
        self.state.connected = true;
    }

    pub fn link_down(&mut self, now_ms: u64) {
        self.state.connected = false;
        self.state.last_disconnect_ms = now_ms;
    }

    /// Advance the actuator by one poll tick. Runs the disconnect
    /// watchdog, then applies a pending request if the debounce allows.
    /// Returns the newly applied speed, or `None` when nothing changed.
    pub fn poll<F: FanPort>(&mut self, now_ms: u64, fan: &mut F) -> Option<u8> {
        // Watchdog: with the link gone past the grace period, stop
        // trusting the last sample and park at the floor. Override speeds
        // come from the operator, not the sensor, and are exempt.
        if !self.state.connected
            && !self.state.override_active
            && self.state.current_speed > self.floor
            && now_ms.saturating_sub(self.state.last_disconnect_ms) > u64::from(self.fan_delay_ms)
        {
            self.state.current_speed = self.floor;
        }

        let target = self.state.current_speed;
        if target == self.state.applied_speed {
            return None;
        }
        let increase = target > self.state.applied_speed;
        let elapsed = now_ms.saturating_sub(self.state.last_change_ms);
        if increase || elapsed > u64::from(self.fan_delay_ms) {
            self.drive(target, now_ms, fan);
            return Some(target);
        }
        None
    }

    fn drive<F: FanPort>(&mut self, speed: u8, now_ms: u64, fan: &mut F) {
        for i in 0..NUM_RELAYS {
            fan.set_channel(i, speed as usize == i + 1);
        }
        self.state.applied_speed = speed;
        self.state.last_change_ms = now_ms;
    }
}
