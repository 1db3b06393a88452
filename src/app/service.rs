//! Fan service: the application core.
//!
//! Consumes decoded link updates and override commands, runs the speed
//! decision engine, and drives the actuator. Everything here is pure
//! host-testable logic; time comes in as a parameter and hardware stays
//! behind the ports.

use log::{info, warn};

use crate::config::DeviceConfig;
use crate::control::actuator::FanActuator;
use crate::control::speed::next_speed;
use crate::hr::decoder::decode_measurement;
use crate::hr::zones::ZoneThresholds;

use super::commands::OverrideCommand;
use super::events::AppEvent;
use super::ports::{ConfigError, ConfigPort, EventSink, FanPort};

/// Delay between a config change and its persistence, batching bursts of
/// updates into one storage write.
const CONFIG_SAVE_DEBOUNCE_MS: u64 = 5_000;

pub struct FanService {
    config: DeviceConfig,
    thresholds: ZoneThresholds,
    actuator: FanActuator,
    config_dirty: bool,
    dirty_since_ms: u64,
    last_indicator: u8,
}

impl FanService {
    pub fn new(config: DeviceConfig) -> Self {
        let thresholds = ZoneThresholds::from_config(&config);
        let actuator = FanActuator::new(&config);
        Self {
            config,
            thresholds,
            actuator,
            config_dirty: false,
            dirty_since_ms: 0,
            last_indicator: 0,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn current_speed(&self) -> u8 {
        self.actuator.state().applied_speed
    }

    pub fn override_active(&self) -> bool {
        self.actuator.state().override_active
    }

    /// Feed one raw measurement notification payload.
    pub fn on_measurement<S: EventSink>(&mut self, payload: &[u8], now_ms: u64, sink: &mut S) {
        let Some(bpm) = decode_measurement(payload) else {
            warn!("malformed measurement payload, {} bytes", payload.len());
            sink.emit(&AppEvent::SampleRejected);
            return;
        };
        if bpm == 0 {
            sink.emit(&AppEvent::SampleRejected);
            return;
        }
        self.on_sample(bpm, now_ms);
    }

    /// Run the decision engine on one valid BPM sample. Ignored while an
    /// override pins the speed.
    pub fn on_sample(&mut self, bpm: u8, now_ms: u64) {
        if self.actuator.state().override_active {
            return;
        }
        let next = next_speed(
            self.actuator.state().current_speed,
            bpm,
            &self.thresholds,
            self.config.hysteresis_bpm,
            self.config.always_on_floor,
        );
        self.actuator.request(next, now_ms);
    }

    /// Apply a manual override. Takes effect immediately, bypassing the
    /// decrease debounce.
    pub fn on_override<F: FanPort, S: EventSink>(
        &mut self,
        cmd: OverrideCommand,
        now_ms: u64,
        fan: &mut F,
        sink: &mut S,
    ) {
        let was_active = self.actuator.state().override_active;
        match cmd {
            OverrideCommand::SetSpeed(0) => {
                self.actuator.set_override(false);
                self.actuator.force_apply(0, now_ms, fan);
                info!("override: off, auto resumed");
            }
            OverrideCommand::SetSpeed(speed) => {
                let speed = speed.min(3);
                self.actuator.set_override(true);
                self.actuator.force_apply(speed, now_ms, fan);
                info!("override: pinned at speed {speed}");
            }
            OverrideCommand::ResumeAuto => {
                self.actuator.set_override(false);
                info!("override: auto resumed");
            }
        }
        let active = self.actuator.state().override_active;
        if active != was_active {
            sink.emit(&AppEvent::OverrideChanged { active });
        }
        sink.emit(&AppEvent::SpeedApplied {
            speed: self.actuator.state().applied_speed,
            connected: self.actuator.state().connected,
            override_active: active,
        });
    }

    pub fn on_link_up<S: EventSink>(&mut self, sink: &mut S) {
        self.actuator.link_up();
        sink.emit(&AppEvent::LinkChanged { connected: true });
    }

    pub fn on_link_down<S: EventSink>(&mut self, now_ms: u64, sink: &mut S) {
        self.actuator.link_down(now_ms);
        sink.emit(&AppEvent::LinkChanged { connected: false });
    }

    /// One poll tick: advance the actuator and refresh the indicator.
    pub fn poll<F: FanPort, S: EventSink>(&mut self, now_ms: u64, fan: &mut F, sink: &mut S) {
        if let Some(speed) = self.actuator.poll(now_ms, fan) {
            info!("fan speed -> {speed}");
            sink.emit(&AppEvent::SpeedApplied {
                speed,
                connected: self.actuator.state().connected,
                override_active: self.actuator.state().override_active,
            });
        }
        let indicator = if self.actuator.state().connected {
            self.actuator.state().applied_speed
        } else {
            0
        };
        if indicator != self.last_indicator {
            fan.set_connectivity_indicator(indicator);
            self.last_indicator = indicator;
        }
    }

    /// Swap in a new configuration after validating it. On rejection the
    /// previous configuration stays in force.
    pub fn update_config(
        &mut self,
        new: DeviceConfig,
        now_ms: u64,
    ) -> Result<(), ConfigError> {
        new.validate()?;
        self.config = new;
        self.thresholds = ZoneThresholds::from_config(&self.config);
        self.actuator.reconfigure(&self.config);
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = now_ms;
        }
        Ok(())
    }

    /// Persist a dirty configuration once the debounce window has passed.
    pub fn auto_save_if_needed<C: ConfigPort, S: EventSink>(
        &mut self,
        now_ms: u64,
        store: &mut C,
        sink: &mut S,
    ) {
        if !self.config_dirty
            || now_ms.saturating_sub(self.dirty_since_ms) < CONFIG_SAVE_DEBOUNCE_MS
        {
            return;
        }
        match store.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("configuration saved");
                sink.emit(&AppEvent::ConfigSaved);
            }
            Err(e) => {
                // Stay dirty; retried on the next tick past the window.
                warn!("configuration save failed: {e}");
            }
        }
    }
}
