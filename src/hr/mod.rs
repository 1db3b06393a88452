//! Heart-rate domain: measurement decoding and training-zone derivation.

pub mod decoder;
pub mod zones;
