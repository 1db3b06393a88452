//! Scripted BLE central for host tests.
//!
//! Records every request the connection manager issues and fails on
//! demand, so tests can walk the manager through arbitrary ladders.

use crate::ble::central::BleCentral;
use crate::ble::{BdAddr, HandleRange};
use crate::error::BleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralCall {
    StartScan,
    StopScan,
    Connect(BdAddr),
    CancelConnect,
    DiscoverServices(u16),
    DiscoverCharacteristics(HandleRange),
    DiscoverDescriptors(u16),
    WriteDescriptor(u16, Vec<u8>),
    Disconnect,
}

#[derive(Debug, Default)]
pub struct SimCentral {
    pub calls: Vec<CentralCall>,
    /// When set, the next request fails with this error.
    pub fail_next: Option<BleError>,
}

impl SimCentral {
    fn record(&mut self, call: CentralCall) -> Result<(), BleError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.calls.push(call);
        Ok(())
    }
}

impl BleCentral for SimCentral {
    fn start_scan(&mut self) -> Result<(), BleError> {
        self.record(CentralCall::StartScan)
    }

    fn stop_scan(&mut self) -> Result<(), BleError> {
        self.record(CentralCall::StopScan)
    }

    fn connect(&mut self, addr: BdAddr) -> Result<(), BleError> {
        self.record(CentralCall::Connect(addr))
    }

    fn cancel_connect(&mut self) -> Result<(), BleError> {
        self.record(CentralCall::CancelConnect)
    }

    fn discover_services(&mut self, uuid: u16) -> Result<(), BleError> {
        self.record(CentralCall::DiscoverServices(uuid))
    }

    fn discover_characteristics(&mut self, range: HandleRange) -> Result<(), BleError> {
        self.record(CentralCall::DiscoverCharacteristics(range))
    }

    fn discover_descriptors(&mut self, characteristic: u16) -> Result<(), BleError> {
        self.record(CentralCall::DiscoverDescriptors(characteristic))
    }

    fn write_descriptor(&mut self, handle: u16, value: &[u8]) -> Result<(), BleError> {
        self.record(CentralCall::WriteDescriptor(handle, value.to_vec()))
    }

    fn disconnect(&mut self) -> Result<(), BleError> {
        self.record(CentralCall::Disconnect)
    }
}
