//! Commands from an external control surface.

/// Manual fan control. `SetSpeed(0)` turns the fan off and hands control
/// back to the heart-rate loop, same as `ResumeAuto` but starting from
/// off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCommand {
    /// Pin the fan at a speed, 0..=3.
    SetSpeed(u8),
    /// Release the override and follow heart rate again.
    ResumeAuto,
}
