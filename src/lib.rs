//! Gale firmware library.
//!
//! Heart-rate-driven fan controller: a BLE central subscribes to a
//! heart-rate sensor and a three-relay fan follows the wearer's training
//! zone. The pure-logic modules here are host-testable; everything
//! ESP-IDF-specific is guarded by `#[cfg(target_os = "espidf")]` inside
//! the adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod ble;
pub mod channels;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod hr;
