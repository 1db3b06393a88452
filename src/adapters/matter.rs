//! Mapping between the three-speed fan and a Matter-style fan-control
//! cluster.
//!
//! The cluster speaks percentages and fan modes; the device speaks speeds
//! 0..=3. Percent writes snap to the nearest step, mode writes translate
//! to override commands, and reads reflect whether the heart-rate loop or
//! an override is in charge.

use crate::app::commands::OverrideCommand;

/// Fan mode values from the fan-control cluster.
pub const FAN_MODE_OFF: u8 = 0;
pub const FAN_MODE_LOW: u8 = 1;
pub const FAN_MODE_MEDIUM: u8 = 2;
pub const FAN_MODE_HIGH: u8 = 3;
pub const FAN_MODE_ON: u8 = 4;
pub const FAN_MODE_AUTO: u8 = 5;

/// Reported percent for each speed step.
const STEP_PERCENT: [u8; 4] = [0, 33, 66, 100];

/// Percent reported for a speed.
pub fn speed_to_percent(speed: u8) -> u8 {
    STEP_PERCENT[usize::from(speed.min(3))]
}

/// Snap a written percent onto a speed step. Any nonzero percent turns
/// the fan on; the reported values are the upper bound of each step.
pub fn percent_to_speed(percent: u8) -> u8 {
    match percent {
        0 => 0,
        1..=33 => 1,
        34..=66 => 2,
        _ => 3,
    }
}

/// Translate a fan-mode write into an override command. Unknown modes
/// yield `None` and must be rejected at the cluster layer.
pub fn mode_to_command(mode: u8) -> Option<OverrideCommand> {
    match mode {
        FAN_MODE_OFF => Some(OverrideCommand::SetSpeed(0)),
        FAN_MODE_LOW | FAN_MODE_MEDIUM | FAN_MODE_HIGH => Some(OverrideCommand::SetSpeed(mode)),
        FAN_MODE_ON => Some(OverrideCommand::SetSpeed(1)),
        FAN_MODE_AUTO => Some(OverrideCommand::ResumeAuto),
        _ => None,
    }
}

/// Queue a fan-mode write as an override command. Returns false for an
/// unknown mode or a full queue.
pub fn submit_mode(mode: u8) -> bool {
    match mode_to_command(mode) {
        Some(cmd) => crate::channels::push_override(cmd),
        None => false,
    }
}

/// Queue a percent write as an override command. Zero percent turns the
/// fan off and hands control back to the heart-rate loop.
pub fn submit_percent(percent: u8) -> bool {
    crate::channels::push_override(OverrideCommand::SetSpeed(percent_to_speed(percent)))
}

/// Cluster-visible fan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanStateReport {
    pub mode: u8,
    pub percent: u8,
}

/// Build the report for the current speed and override flag. Under
/// automatic control a running fan reports Auto rather than a fixed mode.
pub fn report(speed: u8, override_active: bool) -> FanStateReport {
    let mode = if override_active {
        speed.min(3)
    } else if speed > 0 {
        FAN_MODE_AUTO
    } else {
        FAN_MODE_OFF
    };
    FanStateReport {
        mode,
        percent: speed_to_percent(speed),
    }
}
