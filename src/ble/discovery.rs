//! GATT discovery pipeline.
//!
//! Three-level first-match filter: locate the Heart Rate service, then the
//! measurement characteristic inside its handle range, then the CCCD under
//! that characteristic. Each level keeps only the first hit; later matches
//! within the same procedure are ignored.

use super::{DeviceHandles, HandleRange, CCCD_UUID, HEART_RATE_MEASUREMENT_UUID,
            HEART_RATE_SERVICE_UUID};

/// First-match-wins slot keyed by a 16-bit UUID.
#[derive(Debug, Clone, Copy)]
struct UuidFilter<T> {
    uuid: u16,
    found: Option<T>,
}

impl<T: Copy> UuidFilter<T> {
    const fn new(uuid: u16) -> Self {
        Self { uuid, found: None }
    }

    /// Accept `value` if `uuid` matches and nothing was captured yet.
    fn offer(&mut self, uuid: u16, value: T) -> bool {
        if uuid == self.uuid && self.found.is_none() {
            self.found = Some(value);
            true
        } else {
            false
        }
    }

    fn get(&self) -> Option<T> {
        self.found
    }
}

/// Accumulates discovery results across the three GATT procedures.
#[derive(Debug)]
pub struct DiscoveryPipeline {
    service: UuidFilter<HandleRange>,
    measurement: UuidFilter<u16>,
    cccd: UuidFilter<u16>,
}

impl DiscoveryPipeline {
    pub const fn new() -> Self {
        Self {
            service: UuidFilter::new(HEART_RATE_SERVICE_UUID),
            measurement: UuidFilter::new(HEART_RATE_MEASUREMENT_UUID),
            cccd: UuidFilter::new(CCCD_UUID),
        }
    }

    /// Forget all captured handles, ready for a fresh connection.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn offer_service(&mut self, uuid: u16, range: HandleRange) -> bool {
        self.service.offer(uuid, range)
    }

    pub fn offer_characteristic(&mut self, uuid: u16, handle: u16) -> bool {
        self.measurement.offer(uuid, handle)
    }

    pub fn offer_descriptor(&mut self, uuid: u16, handle: u16) -> bool {
        self.cccd.offer(uuid, handle)
    }

    pub fn service_range(&self) -> Option<HandleRange> {
        self.service.get()
    }

    pub fn measurement_handle(&self) -> Option<u16> {
        self.measurement.get()
    }

    /// All three handles, once the final procedure has completed.
    pub fn handles(&self) -> Option<DeviceHandles> {
        Some(DeviceHandles {
            service: self.service.get()?,
            measurement: self.measurement.get()?,
            cccd: self.cccd.get()?,
        })
    }
}

impl Default for DiscoveryPipeline {
    fn default() -> Self {
        Self::new()
    }
}
