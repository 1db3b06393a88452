//! Platform adapters behind the application ports.
//!
//! Each adapter exists in two flavors: the ESP-IDF implementation gated on
//! `target_os = "espidf"`, and a host simulator used by tests.

#[cfg(all(target_os = "espidf", not(feature = "nimble")))]
pub mod bluedroid;
pub mod log_sink;
pub mod matter;
#[cfg(all(target_os = "espidf", feature = "nimble"))]
pub mod nimble;
pub mod nvs;
pub mod relay;
#[cfg(not(target_os = "espidf"))]
pub mod sim_central;
pub mod time;
