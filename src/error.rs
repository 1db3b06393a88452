//! Unified error types for the Gale firmware.
//!
//! One `Error` enum that every subsystem converts into. All variants are
//! `Copy`; values cross the BLE callback boundary without allocation.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A BLE stack operation failed.
    Ble(BleError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ble(e) => write!(f, "ble: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BLE errors
// ---------------------------------------------------------------------------

/// Failures reported by the BLE central capability.
///
/// All of these are transient: the connection manager recovers from every
/// one of them by tearing the link down and rescanning after backoff. None
/// is retried at the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// Starting or stopping a scan failed.
    Scan,
    /// Opening the connection failed before link establishment.
    Connect,
    /// A discovery request (service/characteristic/descriptor) failed.
    Discovery,
    /// The CCCD enable-notifications write could not be issued.
    DescriptorWrite,
    /// Tearing down the link failed.
    Disconnect,
    /// Raw status code from the underlying host stack.
    Stack(i32),
    /// The event channel to the control loop is full (event dropped).
    QueueFull,
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan => write!(f, "scan failed"),
            Self::Connect => write!(f, "connect failed"),
            Self::Discovery => write!(f, "discovery failed"),
            Self::DescriptorWrite => write!(f, "descriptor write failed"),
            Self::Disconnect => write!(f, "disconnect failed"),
            Self::Stack(code) => write!(f, "stack error {code}"),
            Self::QueueFull => write!(f, "event queue full"),
        }
    }
}

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Self::Ble(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for BleError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
