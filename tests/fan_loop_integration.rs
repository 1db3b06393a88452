//! Integration tests: connection manager → fan service → relay port.
//!
//! All tests run on the host against the scripted BLE central and the
//! recording fan, driving the same event flow the device poll loop runs.

use gale::adapters::log_sink::RecordingSink;
use gale::adapters::relay::SimFan;
use gale::adapters::sim_central::SimCentral;
use gale::app::commands::OverrideCommand;
use gale::app::service::FanService;
use gale::ble::manager::{ConnectionManager, LinkUpdate};
use gale::ble::{
    GattStatus, HandleRange, LinkEvent, CCCD_UUID, HEART_RATE_MEASUREMENT_UUID,
    HEART_RATE_SERVICE_UUID, RECONNECT_BACKOFF_MS,
};
use gale::config::DeviceConfig;

const MEASUREMENT_HANDLE: u16 = 12;

struct Harness {
    manager: ConnectionManager,
    service: FanService,
    ble: SimCentral,
    fan: SimFan,
    sink: RecordingSink,
    now: u64,
}

impl Harness {
    fn new(config: DeviceConfig) -> Self {
        Self {
            manager: ConnectionManager::new(),
            service: FanService::new(config),
            ble: SimCentral::default(),
            fan: SimFan::default(),
            sink: RecordingSink::default(),
            now: 0,
        }
    }

    /// One pass of the device poll loop for a single link event.
    fn feed(&mut self, event: LinkEvent) {
        match self.manager.handle_event(event, self.now, &mut self.ble) {
            Some(LinkUpdate::Streaming) => self.service.on_link_up(&mut self.sink),
            Some(LinkUpdate::Lost) => self.service.on_link_down(self.now, &mut self.sink),
            Some(LinkUpdate::Measurement(payload)) => {
                self.service
                    .on_measurement(&payload, self.now, &mut self.sink);
            }
            None => {}
        }
        self.tick(0);
    }

    fn tick(&mut self, dt_ms: u64) {
        self.now += dt_ms;
        self.manager.poll(self.now, &mut self.ble);
        self.service.poll(self.now, &mut self.fan, &mut self.sink);
    }

    fn bring_up(&mut self) {
        self.manager.start_scanning(self.now, &mut self.ble);
        let mut services = heapless::Vec::new();
        services.push(HEART_RATE_SERVICE_UUID).unwrap();
        self.feed(LinkEvent::Advertisement {
            addr: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            services,
        });
        self.feed(LinkEvent::Connected);
        self.feed(LinkEvent::ServiceFound {
            range: HandleRange { start: 10, end: 20 },
            uuid: HEART_RATE_SERVICE_UUID,
        });
        self.feed(LinkEvent::ServicesComplete {
            status: GattStatus::Ok,
        });
        self.feed(LinkEvent::CharacteristicFound {
            handle: MEASUREMENT_HANDLE,
            uuid: HEART_RATE_MEASUREMENT_UUID,
        });
        self.feed(LinkEvent::CharacteristicsComplete {
            status: GattStatus::Ok,
        });
        self.feed(LinkEvent::DescriptorFound {
            handle: MEASUREMENT_HANDLE + 1,
            uuid: CCCD_UUID,
        });
        self.feed(LinkEvent::DescriptorsComplete {
            status: GattStatus::Ok,
        });
        self.feed(LinkEvent::DescriptorWritten {
            status: GattStatus::Ok,
        });
        assert!(self.manager.is_streaming());
    }

    fn notify_bpm(&mut self, bpm: u8) {
        self.feed(LinkEvent::Notification {
            handle: MEASUREMENT_HANDLE,
            payload: heapless::Vec::from_slice(&[0x00, bpm]).unwrap(),
        });
    }

    fn active_channels(&self) -> Vec<usize> {
        (0..self.fan.channels.len())
            .filter(|&i| self.fan.channels[i])
            .collect()
    }
}

fn test_config() -> DeviceConfig {
    DeviceConfig {
        fan_delay_ms: 1_000,
        always_on_floor: 0,
        ..Default::default()
    }
}

#[test]
fn bpm_stream_walks_the_relays_up_and_holds_at_top() {
    let mut h = Harness::new(test_config());
    h.bring_up();

    let expected = [
        (90u8, vec![]),
        (120, vec![0]),
        (150, vec![1]),
        (170, vec![2]),
        // Below zone 3's hysteresis margin but under zone 2's band: hold.
        (130, vec![2]),
    ];
    for (bpm, channels) in expected {
        h.tick(1_000);
        h.notify_bpm(bpm);
        assert_eq!(h.active_channels(), channels, "bpm {bpm}");
    }
}

#[test]
fn disconnect_grace_spins_the_fan_down() {
    let mut h = Harness::new(test_config());
    h.bring_up();
    h.tick(1_000);
    h.notify_bpm(170);
    assert_eq!(h.active_channels(), vec![2]);

    h.feed(LinkEvent::Disconnected { reason: 8 });
    // Inside the grace period the speed holds.
    h.tick(900);
    assert_eq!(h.active_channels(), vec![2]);
    // Past it the fan parks at the floor.
    h.tick(200);
    assert_eq!(h.active_channels(), Vec::<usize>::new());
}

#[test]
fn reconnect_after_backoff_resumes_control() {
    let mut h = Harness::new(test_config());
    h.bring_up();
    h.feed(LinkEvent::Disconnected { reason: 8 });

    h.tick(RECONNECT_BACKOFF_MS);
    // The manager rescans on its own; a fresh bring-up then streams again.
    h.bring_up();
    h.tick(1_000);
    h.notify_bpm(150);
    assert_eq!(h.active_channels(), vec![1]);
}

#[test]
fn override_wins_over_the_stream_until_released() {
    let mut h = Harness::new(test_config());
    h.bring_up();

    let cmd = OverrideCommand::SetSpeed(1);
    h.service.on_override(cmd, h.now, &mut h.fan, &mut h.sink);
    assert_eq!(h.active_channels(), vec![0]);

    // The stream keeps arriving but the pinned speed stands.
    h.tick(1_000);
    h.notify_bpm(170);
    assert_eq!(h.active_channels(), vec![0]);

    h.service
        .on_override(OverrideCommand::ResumeAuto, h.now, &mut h.fan, &mut h.sink);
    h.tick(1_000);
    h.notify_bpm(170);
    assert_eq!(h.active_channels(), vec![2]);
}

#[test]
fn zero_and_malformed_payloads_leave_the_fan_alone() {
    let mut h = Harness::new(test_config());
    h.bring_up();
    h.tick(1_000);
    h.notify_bpm(150);
    assert_eq!(h.active_channels(), vec![1]);

    h.tick(1_000);
    // Sensor reports "no reading".
    h.notify_bpm(0);
    // Truncated 16-bit payload.
    h.feed(LinkEvent::Notification {
        handle: MEASUREMENT_HANDLE,
        payload: heapless::Vec::from_slice(&[0x01, 200]).unwrap(),
    });
    assert_eq!(h.active_channels(), vec![1]);
}
