//! Monotonic millisecond clock.

#[cfg(target_os = "espidf")]
pub fn now_ms() -> u64 {
    // esp_timer counts microseconds since boot and never goes backwards.
    (unsafe { esp_idf_sys::esp_timer_get_time() } / 1_000) as u64
}

#[cfg(not(target_os = "espidf"))]
pub fn now_ms() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}
