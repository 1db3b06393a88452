//! Speed decision engine.
//!
//! A pure transition function from (current speed, BPM sample) to the next
//! speed, evaluated on every valid decoded sample while no external
//! override is active. Rising transitions use the plain zone boundaries;
//! falling transitions additionally require the BPM to sit inside the
//! target zone's band and clear the hysteresis margin below the boundary
//! above it, which prevents chatter at the edges.
//!
//! ```text
//!            zone1        zone2        zone3
//!  BPM ──────┼────────────┼────────────┼──────────▶
//!   speed 0  │  speed 1   │  speed 2   │  speed 3
//!            │◀─ hyst ─┤  │◀─ hyst ─┤
//! ```
//!
//! When no rule matches the speed is held unchanged. That includes falling
//! below `zone3` from speed 3 without reaching zone 2's band: the engine
//! stays at 3 until the sample lands inside a lower band.

use crate::hr::zones::ZoneThresholds;

/// Compute the next fan speed for one BPM sample.
///
/// Pure and side-effect-free; the caller records the transition timestamp
/// used by the actuator's decrease-delay logic.
pub fn next_speed(
    current: u8,
    bpm: u8,
    thresholds: &ZoneThresholds,
    hysteresis_bpm: u8,
    floor: u8,
) -> u8 {
    let hr = f32::from(bpm);
    let hyst = f32::from(hysteresis_bpm);
    let ZoneThresholds {
        zone1,
        zone2,
        zone3,
    } = *thresholds;

    // Below zone 1 → fan off (or the always-on floor).
    if current > 0 && hr < zone1 {
        return floor;
    }
    // Zone 1: rising into the band, or falling into it past the hysteresis margin.
    if (current < 1 && hr >= zone1 && hr < zone2)
        || (current > 1 && hr >= zone1 && hr < zone2 - hyst)
    {
        return 1;
    }
    // Zone 2.
    if (current < 2 && hr >= zone2 && hr < zone3)
        || (current > 2 && hr >= zone2 && hr < zone3 - hyst)
    {
        return 2;
    }
    // Zone 3: rising only; there is no higher zone to fall from.
    if current < 3 && hr >= zone3 {
        return 3;
    }

    // No rule matched: hold steady.
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    // zone1=110, zone2=140, zone3=160, the reference setup.
    const T: ZoneThresholds = ZoneThresholds {
        zone1: 110.0,
        zone2: 140.0,
        zone3: 160.0,
    };
    const HYST: u8 = 15;

    #[test]
    fn below_zone1_drops_to_floor() {
        for s in 1..=3 {
            assert_eq!(next_speed(s, 90, &T, HYST, 0), 0);
            assert_eq!(next_speed(s, 109, &T, HYST, 1), 1);
        }
    }

    #[test]
    fn below_zone1_holds_when_already_off() {
        assert_eq!(next_speed(0, 90, &T, HYST, 0), 0);
    }

    #[test]
    fn rising_through_zones() {
        assert_eq!(next_speed(0, 110, &T, HYST, 0), 1);
        assert_eq!(next_speed(1, 140, &T, HYST, 0), 2);
        assert_eq!(next_speed(2, 160, &T, HYST, 0), 3);
        // Skipping a band is allowed when rising.
        assert_eq!(next_speed(0, 150, &T, HYST, 0), 2);
        assert_eq!(next_speed(0, 200, &T, HYST, 0), 3);
    }

    #[test]
    fn hysteresis_blocks_downgrade_at_boundary() {
        // At exactly zone2 from speed 2: stay.
        assert_eq!(next_speed(2, 140, &T, HYST, 0), 2);
        // Just below zone2 but inside the hysteresis margin: stay.
        assert_eq!(next_speed(2, 130, &T, HYST, 0), 2);
        assert_eq!(next_speed(2, 125, &T, HYST, 0), 2);
        // Past the margin: drop to 1.
        assert_eq!(next_speed(2, 124, &T, HYST, 0), 1);
    }

    #[test]
    fn idempotent_within_band() {
        for bpm in 110..140 {
            assert_eq!(next_speed(1, bpm, &T, HYST, 0), 1);
        }
        for bpm in 140..160 {
            assert_eq!(next_speed(2, bpm, &T, HYST, 0), 2);
        }
        for bpm in 160..=255u16 {
            assert_eq!(next_speed(3, bpm as u8, &T, HYST, 0), 3);
        }
    }

    #[test]
    fn falling_from_top_holds_until_a_band_matches() {
        // 130 clears zone3 - hyst = 145 but sits below zone2's band, so no
        // rule matches and speed holds at 3.
        assert_eq!(next_speed(3, 130, &T, HYST, 0), 3);
        // Inside zone2's band and past the margin: drop to 2.
        assert_eq!(next_speed(3, 140, &T, HYST, 0), 2);
        assert_eq!(next_speed(3, 144, &T, HYST, 0), 2);
        // At the margin boundary: hold.
        assert_eq!(next_speed(3, 145, &T, HYST, 0), 3);
        // Inside zone1's band and past zone2's margin: drop to 1.
        assert_eq!(next_speed(3, 120, &T, HYST, 0), 1);
    }

    #[test]
    fn end_to_end_reference_stream() {
        // Reference stream for the default thresholds, hysteresis 15, floor 0.
        let stream = [90u8, 120, 150, 170, 130];
        let expected = [0u8, 1, 2, 3, 3];
        let mut speed = 0;
        for (bpm, want) in stream.iter().zip(expected.iter()) {
            speed = next_speed(speed, *bpm, &T, HYST, 0);
            assert_eq!(speed, *want, "bpm {bpm}");
        }
    }

    #[test]
    fn always_on_floor_is_respected() {
        // floor 1: dropping below zone 1 parks at speed 1, not 0.
        assert_eq!(next_speed(2, 90, &T, HYST, 1), 1);
        assert_eq!(next_speed(3, 80, &T, HYST, 1), 1);
    }
}
