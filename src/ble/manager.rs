//! Connection manager.
//!
//! Drives the scan / connect / discover / subscribe ladder as a state
//! machine over [`LinkEvent`]s, retrying with a fixed backoff whenever the
//! ladder collapses. All requests go out through the [`BleCentral`] port;
//! the manager never blocks and never talks to the stack from a callback.

use log::{debug, info, warn};

use crate::error::BleError;

use super::central::BleCentral;
use super::discovery::DiscoveryPipeline;
use super::{ConnectionState, DeviceHandles, GattStatus, LinkEvent, MAX_MEASUREMENT_LEN,
            ENABLE_NOTIFICATIONS, HEART_RATE_SERVICE_UUID, RECONNECT_BACKOFF_MS};

/// What the application layer needs to know about a handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUpdate {
    /// Subscription is live; measurements will follow.
    Streaming,
    /// A streaming link was lost.
    Lost,
    /// One measurement notification payload.
    Measurement(heapless::Vec<u8, MAX_MEASUREMENT_LEN>),
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    pipeline: DiscoveryPipeline,
    handles: Option<DeviceHandles>,
    /// Pending scan restart, at most one in flight.
    rescan_deadline_ms: Option<u64>,
    was_streaming: bool,
}

impl ConnectionManager {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            pipeline: DiscoveryPipeline::new(),
            handles: None,
            rescan_deadline_ms: None,
            was_streaming: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == ConnectionState::Streaming
    }

    /// Kick off scanning. A no-op unless the manager is idle with no
    /// restart pending, so callers may invoke it freely.
    pub fn start_scanning<B: BleCentral>(&mut self, now_ms: u64, ble: &mut B) {
        if self.state != ConnectionState::Idle {
            return;
        }
        match ble.start_scan() {
            Ok(()) => {
                info!("scan started");
                self.state = ConnectionState::Scanning;
                self.rescan_deadline_ms = None;
            }
            Err(e) => {
                warn!("scan start failed: {e}");
                self.arm_backoff(now_ms);
            }
        }
    }

    /// Fire the pending scan restart once its deadline passes.
    pub fn poll<B: BleCentral>(&mut self, now_ms: u64, ble: &mut B) {
        if let Some(deadline) = self.rescan_deadline_ms {
            if now_ms >= deadline && self.state == ConnectionState::Idle {
                self.rescan_deadline_ms = None;
                self.start_scanning(now_ms, ble);
            }
        }
    }

    /// Advance the state machine by one link event.
    pub fn handle_event<B: BleCentral>(
        &mut self,
        event: LinkEvent,
        now_ms: u64,
        ble: &mut B,
    ) -> Option<LinkUpdate> {
        match event {
            LinkEvent::Advertisement { addr, services } => {
                if self.state == ConnectionState::Scanning
                    && services.contains(&HEART_RATE_SERVICE_UUID)
                {
                    info!(
                        "heart-rate advertiser {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                        addr[5], addr[4], addr[3], addr[2], addr[1], addr[0]
                    );
                    if let Err(e) = ble.stop_scan() {
                        // The connect attempt supersedes the scan anyway.
                        warn!("scan stop failed: {e}");
                    }
                    self.state = ConnectionState::Connecting;
                    if let Err(e) = ble.connect(addr) {
                        warn!("connect request failed: {e}");
                        self.fail(now_ms);
                    }
                }
                None
            }
            LinkEvent::ScanStopped => {
                // Expected while connecting; anything else means the stack
                // gave up on its own.
                if self.state == ConnectionState::Scanning {
                    debug!("scan stopped by stack");
                    self.fail(now_ms);
                }
                None
            }
            LinkEvent::Connected => {
                if self.state != ConnectionState::Connecting {
                    return None;
                }
                self.pipeline.reset();
                self.step(
                    now_ms,
                    ConnectionState::DiscoveringServices,
                    ble.discover_services(HEART_RATE_SERVICE_UUID),
                    ble,
                );
                None
            }
            LinkEvent::ConnectFailed { status } => {
                warn!("connect failed, status {status}");
                self.fail(now_ms);
                None
            }
            LinkEvent::ServiceFound { range, uuid } => {
                if self.state == ConnectionState::DiscoveringServices {
                    self.pipeline.offer_service(uuid, range);
                }
                None
            }
            LinkEvent::ServicesComplete { status } => {
                if self.state != ConnectionState::DiscoveringServices {
                    return None;
                }
                match (status, self.pipeline.service_range()) {
                    (GattStatus::Ok, Some(range)) => {
                        self.step(
                            now_ms,
                            ConnectionState::DiscoveringCharacteristics,
                            ble.discover_characteristics(range),
                            ble,
                        );
                    }
                    _ => {
                        warn!("heart-rate service not found");
                        self.drop_link(now_ms, ble);
                    }
                }
                None
            }
            LinkEvent::CharacteristicFound { handle, uuid } => {
                if self.state == ConnectionState::DiscoveringCharacteristics {
                    self.pipeline.offer_characteristic(uuid, handle);
                }
                None
            }
            LinkEvent::CharacteristicsComplete { status } => {
                if self.state != ConnectionState::DiscoveringCharacteristics {
                    return None;
                }
                match (status, self.pipeline.measurement_handle()) {
                    (GattStatus::Ok, Some(handle)) => {
                        self.step(
                            now_ms,
                            ConnectionState::DiscoveringDescriptors,
                            ble.discover_descriptors(handle),
                            ble,
                        );
                    }
                    _ => {
                        warn!("measurement characteristic not found");
                        self.drop_link(now_ms, ble);
                    }
                }
                None
            }
            LinkEvent::DescriptorFound { handle, uuid } => {
                if self.state == ConnectionState::DiscoveringDescriptors {
                    self.pipeline.offer_descriptor(uuid, handle);
                }
                None
            }
            LinkEvent::DescriptorsComplete { status } => {
                if self.state != ConnectionState::DiscoveringDescriptors {
                    return None;
                }
                match (status, self.pipeline.handles()) {
                    (GattStatus::Ok, Some(handles)) => {
                        self.handles = Some(handles);
                        self.step(
                            now_ms,
                            ConnectionState::Subscribing,
                            ble.write_descriptor(handles.cccd, &ENABLE_NOTIFICATIONS),
                            ble,
                        );
                    }
                    _ => {
                        warn!("client configuration descriptor not found");
                        self.drop_link(now_ms, ble);
                    }
                }
                None
            }
            LinkEvent::DescriptorWritten { status } => {
                if self.state != ConnectionState::Subscribing {
                    return None;
                }
                // Some sensors report a write error yet notify anyway, so
                // the link is treated as live either way.
                if !status.is_ok() {
                    warn!("descriptor write reported {status:?}");
                }
                info!("subscribed to heart-rate notifications");
                self.state = ConnectionState::Streaming;
                self.was_streaming = true;
                Some(LinkUpdate::Streaming)
            }
            LinkEvent::Notification { handle, payload } => {
                let expected = self.handles.map(|h| h.measurement);
                let accept = matches!(
                    self.state,
                    ConnectionState::Subscribing | ConnectionState::Streaming
                ) && expected == Some(handle);
                if accept {
                    Some(LinkUpdate::Measurement(payload))
                } else {
                    debug!("notification on unexpected handle {handle}");
                    None
                }
            }
            LinkEvent::Disconnected { reason } => {
                info!("disconnected, reason {reason}");
                let lost = self.was_streaming;
                self.fail(now_ms);
                lost.then_some(LinkUpdate::Lost)
            }
        }
    }

    /// Issue the next ladder step, falling back to a teardown when the
    /// request itself is refused.
    fn step<B: BleCentral>(
        &mut self,
        now_ms: u64,
        next: ConnectionState,
        result: Result<(), BleError>,
        ble: &mut B,
    ) {
        match result {
            Ok(()) => {
                debug!("link state -> {}", next.name());
                self.state = next;
            }
            Err(e) => {
                warn!("gatt request failed: {e}");
                self.drop_link(now_ms, ble);
            }
        }
    }

    /// Tear down an established or half-established connection and retry.
    fn drop_link<B: BleCentral>(&mut self, now_ms: u64, ble: &mut B) {
        self.state = ConnectionState::Disconnecting;
        if ble.disconnect().is_err() {
            // No disconnect event will arrive; go straight to the retry.
            self.fail(now_ms);
        }
    }

    /// Reset to idle and arm the single-flight scan restart.
    fn fail(&mut self, now_ms: u64) {
        self.state = ConnectionState::Idle;
        self.pipeline.reset();
        self.handles = None;
        self.was_streaming = false;
        self.arm_backoff(now_ms);
    }

    fn arm_backoff(&mut self, now_ms: u64) {
        if self.rescan_deadline_ms.is_none() {
            self.rescan_deadline_ms = Some(now_ms + RECONNECT_BACKOFF_MS);
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim_central::{CentralCall, SimCentral};
    use crate::ble::{HandleRange, CCCD_UUID, HEART_RATE_MEASUREMENT_UUID};

    const ADDR: crate::ble::BdAddr = [1, 2, 3, 4, 5, 6];

    fn hr_advertisement() -> LinkEvent {
        let mut services = heapless::Vec::new();
        services.push(HEART_RATE_SERVICE_UUID).unwrap();
        LinkEvent::Advertisement {
            addr: ADDR,
            services,
        }
    }

    fn payload(bytes: &[u8]) -> heapless::Vec<u8, MAX_MEASUREMENT_LEN> {
        heapless::Vec::from_slice(bytes).unwrap()
    }

    /// Walk the manager through a full successful ladder.
    fn bring_up(m: &mut ConnectionManager, ble: &mut SimCentral) {
        m.start_scanning(0, ble);
        m.handle_event(hr_advertisement(), 10, ble);
        m.handle_event(LinkEvent::Connected, 20, ble);
        m.handle_event(
            LinkEvent::ServiceFound {
                range: HandleRange { start: 10, end: 20 },
                uuid: HEART_RATE_SERVICE_UUID,
            },
            30,
            ble,
        );
        m.handle_event(
            LinkEvent::ServicesComplete {
                status: GattStatus::Ok,
            },
            30,
            ble,
        );
        m.handle_event(
            LinkEvent::CharacteristicFound {
                handle: 12,
                uuid: HEART_RATE_MEASUREMENT_UUID,
            },
            40,
            ble,
        );
        m.handle_event(
            LinkEvent::CharacteristicsComplete {
                status: GattStatus::Ok,
            },
            40,
            ble,
        );
        m.handle_event(
            LinkEvent::DescriptorFound {
                handle: 13,
                uuid: CCCD_UUID,
            },
            50,
            ble,
        );
        m.handle_event(
            LinkEvent::DescriptorsComplete {
                status: GattStatus::Ok,
            },
            50,
            ble,
        );
    }

    #[test]
    fn full_ladder_reaches_streaming() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        bring_up(&mut m, &mut ble);
        assert_eq!(m.state(), ConnectionState::Subscribing);
        let update = m.handle_event(
            LinkEvent::DescriptorWritten {
                status: GattStatus::Ok,
            },
            60,
            &mut ble,
        );
        assert_eq!(update, Some(LinkUpdate::Streaming));
        assert!(m.is_streaming());
        assert_eq!(
            ble.calls,
            vec![
                CentralCall::StartScan,
                CentralCall::StopScan,
                CentralCall::Connect(ADDR),
                CentralCall::DiscoverServices(HEART_RATE_SERVICE_UUID),
                CentralCall::DiscoverCharacteristics(HandleRange { start: 10, end: 20 }),
                CentralCall::DiscoverDescriptors(12),
                CentralCall::WriteDescriptor(13, ENABLE_NOTIFICATIONS.to_vec()),
            ]
        );
    }

    #[test]
    fn failed_descriptor_write_still_streams() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        bring_up(&mut m, &mut ble);
        let update = m.handle_event(
            LinkEvent::DescriptorWritten {
                status: GattStatus::Err(3),
            },
            60,
            &mut ble,
        );
        assert_eq!(update, Some(LinkUpdate::Streaming));
    }

    #[test]
    fn notifications_only_accepted_on_measurement_handle() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        bring_up(&mut m, &mut ble);
        m.handle_event(
            LinkEvent::DescriptorWritten {
                status: GattStatus::Ok,
            },
            60,
            &mut ble,
        );
        let update = m.handle_event(
            LinkEvent::Notification {
                handle: 12,
                payload: payload(&[0x00, 72]),
            },
            70,
            &mut ble,
        );
        assert_eq!(update, Some(LinkUpdate::Measurement(payload(&[0x00, 72]))));
        // Wrong handle is dropped.
        let update = m.handle_event(
            LinkEvent::Notification {
                handle: 99,
                payload: payload(&[0x00, 72]),
            },
            80,
            &mut ble,
        );
        assert_eq!(update, None);
    }

    #[test]
    fn advertisement_without_hr_service_is_ignored() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        let mut services = heapless::Vec::new();
        services.push(0x180Fu16).unwrap();
        m.handle_event(
            LinkEvent::Advertisement {
                addr: ADDR,
                services,
            },
            10,
            &mut ble,
        );
        assert_eq!(m.state(), ConnectionState::Scanning);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
    }

    #[test]
    fn disconnect_from_streaming_reports_lost_and_rescans_after_backoff() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        bring_up(&mut m, &mut ble);
        m.handle_event(
            LinkEvent::DescriptorWritten {
                status: GattStatus::Ok,
            },
            60,
            &mut ble,
        );
        let update = m.handle_event(LinkEvent::Disconnected { reason: 8 }, 100, &mut ble);
        assert_eq!(update, Some(LinkUpdate::Lost));
        assert_eq!(m.state(), ConnectionState::Idle);

        ble.calls.clear();
        // Before the deadline nothing happens.
        m.poll(100 + RECONNECT_BACKOFF_MS - 1, &mut ble);
        assert!(ble.calls.is_empty());
        m.poll(100 + RECONNECT_BACKOFF_MS, &mut ble);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
        assert_eq!(m.state(), ConnectionState::Scanning);
    }

    #[test]
    fn connect_failure_retries_without_reporting_lost() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        m.handle_event(hr_advertisement(), 10, &mut ble);
        let update = m.handle_event(LinkEvent::ConnectFailed { status: 0x3E }, 20, &mut ble);
        assert_eq!(update, None);
        assert_eq!(m.state(), ConnectionState::Idle);
        ble.calls.clear();
        m.poll(20 + RECONNECT_BACKOFF_MS, &mut ble);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
    }

    #[test]
    fn missing_service_tears_down_and_retries() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        m.handle_event(hr_advertisement(), 10, &mut ble);
        m.handle_event(LinkEvent::Connected, 20, &mut ble);
        // No ServiceFound arrives.
        m.handle_event(
            LinkEvent::ServicesComplete {
                status: GattStatus::Ok,
            },
            30,
            &mut ble,
        );
        assert_eq!(m.state(), ConnectionState::Disconnecting);
        assert_eq!(ble.calls.last(), Some(&CentralCall::Disconnect));
        let update = m.handle_event(LinkEvent::Disconnected { reason: 0 }, 40, &mut ble);
        // Never streamed, so no loss is reported.
        assert_eq!(update, None);
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn failed_scan_stop_does_not_abort_the_connect() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        ble.fail_next = Some(crate::error::BleError::Scan);
        m.handle_event(hr_advertisement(), 10, &mut ble);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(ble.calls.last(), Some(&CentralCall::Connect(ADDR)));
    }

    #[test]
    fn missing_characteristic_tears_down_and_retries() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        m.handle_event(hr_advertisement(), 10, &mut ble);
        m.handle_event(LinkEvent::Connected, 20, &mut ble);
        m.handle_event(
            LinkEvent::ServiceFound {
                range: HandleRange { start: 10, end: 20 },
                uuid: HEART_RATE_SERVICE_UUID,
            },
            30,
            &mut ble,
        );
        m.handle_event(
            LinkEvent::ServicesComplete {
                status: GattStatus::Ok,
            },
            30,
            &mut ble,
        );
        // Only unrelated characteristics turn up before completion.
        m.handle_event(
            LinkEvent::CharacteristicFound {
                handle: 14,
                uuid: 0x2A38, // Body Sensor Location
            },
            40,
            &mut ble,
        );
        m.handle_event(
            LinkEvent::CharacteristicsComplete {
                status: GattStatus::Ok,
            },
            40,
            &mut ble,
        );
        assert_eq!(m.state(), ConnectionState::Disconnecting);
        assert_eq!(ble.calls.last(), Some(&CentralCall::Disconnect));
        let update = m.handle_event(LinkEvent::Disconnected { reason: 0 }, 50, &mut ble);
        assert_eq!(update, None);
        assert_eq!(m.state(), ConnectionState::Idle);
        ble.calls.clear();
        m.poll(50 + RECONNECT_BACKOFF_MS, &mut ble);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
    }

    #[test]
    fn backoff_is_single_flight() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        m.handle_event(hr_advertisement(), 10, &mut ble);
        m.handle_event(LinkEvent::ConnectFailed { status: 1 }, 20, &mut ble);
        // A second failure while one restart is already pending does not
        // push the deadline out.
        m.handle_event(LinkEvent::Disconnected { reason: 0 }, 500, &mut ble);
        ble.calls.clear();
        m.poll(20 + RECONNECT_BACKOFF_MS, &mut ble);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
        ble.calls.clear();
        m.poll(500 + RECONNECT_BACKOFF_MS, &mut ble);
        assert!(ble.calls.is_empty());
    }

    #[test]
    fn start_scanning_is_idempotent() {
        let mut m = ConnectionManager::new();
        let mut ble = SimCentral::default();
        m.start_scanning(0, &mut ble);
        m.start_scanning(0, &mut ble);
        assert_eq!(ble.calls, vec![CentralCall::StartScan]);
    }
}
