//! Gale firmware entry point.
//!
//! Boot order: logger, NVS config, relay board, BLE stack. After that a
//! 100 ms poll loop owns all state: it drains the link and override
//! queues, steps the connection manager and fan service, and ticks the
//! status LED. BLE callbacks never touch state directly; they only
//! enqueue.

#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use log::{info, warn};

use gale::adapters::nvs::NvsConfigStore;
use gale::adapters::relay::RelayFan;
use gale::adapters::time::now_ms;
use gale::app::events::AppEvent;
use gale::app::ports::{ConfigPort, EventSink};
use gale::app::service::FanService;
use gale::ble::manager::{ConnectionManager, LinkUpdate};
use gale::channels::{LINK_CHANNEL, OVERRIDE_CHANNEL};
use gale::config::DeviceConfig;

const POLL_INTERVAL_MS: u32 = 100;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("gale v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs_partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    let mut store = NvsConfigStore::new(nvs_partition)?;
    let config = match store.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({e}), using defaults");
            DeviceConfig::default()
        }
    };

    // ── 3. Relay board and status LED ─────────────────────────
    // Pin numbers come from the stored config; peripherals are claimed
    // once here and never again, so the unchecked constructors are sound.
    let _peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    let [r0, r1, r2] = config
        .relay_gpio
        .map(|n| unsafe { AnyOutputPin::new(i32::from(n)) });
    let led = unsafe { AnyOutputPin::new(i32::from(config.led_gpio)) };
    let mut fan = RelayFan::new(
        [
            PinDriver::output(r0)?,
            PinDriver::output(r1)?,
            PinDriver::output(r2)?,
        ],
        PinDriver::output(led)?,
    )?;

    // ── 4. BLE central ────────────────────────────────────────
    #[cfg(not(feature = "nimble"))]
    let mut ble = gale::adapters::bluedroid::BluedroidCentral::init()?;
    #[cfg(feature = "nimble")]
    let mut ble = gale::adapters::nimble::NimbleCentral::new();

    // ── 5. Application core ───────────────────────────────────
    let mut service = FanService::new(config);
    let mut manager = ConnectionManager::new();
    let mut sink = gale::adapters::log_sink::LogSink;
    sink.emit(&AppEvent::Started);

    manager.start_scanning(now_ms(), &mut ble);

    info!("entering poll loop");

    // ── 6. Poll loop ──────────────────────────────────────────
    loop {
        let now = now_ms();

        while let Ok(event) = LINK_CHANNEL.try_receive() {
            match manager.handle_event(event, now, &mut ble) {
                Some(LinkUpdate::Streaming) => service.on_link_up(&mut sink),
                Some(LinkUpdate::Lost) => service.on_link_down(now, &mut sink),
                Some(LinkUpdate::Measurement(payload)) => {
                    service.on_measurement(&payload, now, &mut sink);
                }
                None => {}
            }
        }

        while let Ok(cmd) = OVERRIDE_CHANNEL.try_receive() {
            service.on_override(cmd, now, &mut fan, &mut sink);
        }

        manager.poll(now, &mut ble);
        service.poll(now, &mut fan, &mut sink);
        service.auto_save_if_needed(now, &mut store, &mut sink);
        fan.tick_led(POLL_INTERVAL_MS);

        esp_idf_hal::delay::FreeRtos::delay_ms(POLL_INTERVAL_MS);
    }
}
