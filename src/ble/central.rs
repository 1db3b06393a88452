//! Port trait for the platform BLE central.
//!
//! Every operation is a request to the stack; completion arrives later as
//! a [`LinkEvent`](super::LinkEvent) on the link channel. Implementations
//! live in the adapters module, one per stack plus a scripted simulator
//! for host tests.

use crate::error::BleError;

use super::{BdAddr, HandleRange};

pub trait BleCentral {
    /// Begin an active scan for advertisers.
    fn start_scan(&mut self) -> Result<(), BleError>;

    fn stop_scan(&mut self) -> Result<(), BleError>;

    /// Initiate a connection to the given address.
    fn connect(&mut self, addr: BdAddr) -> Result<(), BleError>;

    /// Abort a connection attempt that has not completed.
    fn cancel_connect(&mut self) -> Result<(), BleError>;

    /// Enumerate primary services matching a 16-bit UUID.
    fn discover_services(&mut self, uuid: u16) -> Result<(), BleError>;

    /// Enumerate characteristics within a service's handle range.
    fn discover_characteristics(&mut self, range: HandleRange) -> Result<(), BleError>;

    /// Enumerate descriptors of a characteristic.
    fn discover_descriptors(&mut self, characteristic: u16) -> Result<(), BleError>;

    /// Write a descriptor value, typically the CCCD.
    fn write_descriptor(&mut self, handle: u16, value: &[u8]) -> Result<(), BleError>;

    /// Tear down the current connection.
    fn disconnect(&mut self) -> Result<(), BleError>;
}
