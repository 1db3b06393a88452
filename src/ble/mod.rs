//! BLE central: link events, GATT discovery, and connection management.
//!
//! The stack-specific adapters translate their callbacks into [`LinkEvent`]
//! values and push them onto the link channel; everything in this module is
//! stack-agnostic and runs on the poll loop.

pub mod central;
pub mod discovery;
pub mod manager;

/// Heart Rate Service, 16-bit SIG UUID.
pub const HEART_RATE_SERVICE_UUID: u16 = 0x180D;
/// Heart Rate Measurement characteristic.
pub const HEART_RATE_MEASUREMENT_UUID: u16 = 0x2A37;
/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: u16 = 0x2902;
/// CCCD value enabling notifications.
pub const ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

/// Delay before restarting the scan after a failed attempt or link loss.
pub const RECONNECT_BACKOFF_MS: u64 = 1_000;

/// Longest measurement payload we keep.
pub const MAX_MEASUREMENT_LEN: usize = 20;

/// Public Bluetooth device address.
pub type BdAddr = [u8; 6];

/// Inclusive GATT handle range of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

/// Handles located during discovery, everything needed to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandles {
    pub service: HandleRange,
    pub measurement: u16,
    pub cccd: u16,
}

/// Outcome of a GATT procedure as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Ok,
    Err(i32),
}

impl GattStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, GattStatus::Ok)
    }
}

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    DiscoveringDescriptors,
    Subscribing,
    Streaming,
    Disconnecting,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::DiscoveringServices => "discovering-services",
            ConnectionState::DiscoveringCharacteristics => "discovering-characteristics",
            ConnectionState::DiscoveringDescriptors => "discovering-descriptors",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

/// One event from the BLE stack, queued by an adapter callback and
/// consumed by [`manager::ConnectionManager`] on the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Advertisement seen while scanning, with the 16-bit service UUIDs
    /// the advertiser listed.
    Advertisement {
        addr: BdAddr,
        services: heapless::Vec<u16, 8>,
    },
    ScanStopped,
    Connected,
    ConnectFailed {
        status: i32,
    },
    ServiceFound {
        range: HandleRange,
        uuid: u16,
    },
    ServicesComplete {
        status: GattStatus,
    },
    CharacteristicFound {
        handle: u16,
        uuid: u16,
    },
    CharacteristicsComplete {
        status: GattStatus,
    },
    DescriptorFound {
        handle: u16,
        uuid: u16,
    },
    DescriptorsComplete {
        status: GattStatus,
    },
    DescriptorWritten {
        status: GattStatus,
    },
    Notification {
        handle: u16,
        payload: heapless::Vec<u8, MAX_MEASUREMENT_LEN>,
    },
    Disconnected {
        reason: i32,
    },
}
