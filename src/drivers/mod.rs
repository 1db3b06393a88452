//! Small hardware-independent drivers.

pub mod status_led;
