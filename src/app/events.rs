//! Application events emitted through the [`EventSink`](super::ports::EventSink) port.

/// State changes worth reporting outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Started,
    /// Sensor link came up or went down.
    LinkChanged { connected: bool },
    /// A new speed reached the relays.
    SpeedApplied {
        speed: u8,
        connected: bool,
        override_active: bool,
    },
    OverrideChanged { active: bool },
    /// A measurement payload was dropped as malformed or zero.
    SampleRejected,
    ConfigSaved,
}
