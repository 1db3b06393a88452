//! Application layer: ports, commands, events, and the fan service that
//! ties the heart-rate domain to the actuator.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
