//! Fan control: the pure speed decision engine and the debounced actuator.

pub mod actuator;
pub mod speed;
