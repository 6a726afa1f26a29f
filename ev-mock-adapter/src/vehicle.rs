//! Simulated UDS responses for a single-motor leaf-platform vehicle,
//! covering the same request catalogue the `leaf` decoder expects.
//!
//! Values ramp up and down over time rather than sitting still, the same
//! way the reference mock server's RPM generator did, so a connected
//! client sees moving numbers instead of a frozen snapshot.

use std::time::Instant;

/// Triangle-wave ramp between `min` and `max`, spending `hold_secs` at
/// each extreme and `ramp_secs` moving between them.
fn ramp(elapsed: f64, min: f64, max: f64, ramp_secs: f64, hold_secs: f64) -> f64 {
    let cycle = 2.0 * (ramp_secs + hold_secs);
    let phase = elapsed % cycle;
    if phase < ramp_secs {
        min + (max - min) * (phase / ramp_secs)
    } else if phase < ramp_secs + hold_secs {
        max
    } else if phase < 2.0 * ramp_secs + hold_secs {
        let p = phase - ramp_secs - hold_secs;
        max - (max - min) * (p / ramp_secs)
    } else {
        min
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ramp_u8(elapsed: f64, min: u8, max: u8, ramp_secs: f64, hold_secs: f64) -> u8 {
    ramp(elapsed, f64::from(min), f64::from(max), ramp_secs, hold_secs) as u8
}

#[allow(clippy::cast_possible_truncation)]
fn ramp_i16(elapsed: f64, min: i16, max: i16, ramp_secs: f64, hold_secs: f64) -> i16 {
    ramp(elapsed, f64::from(min), f64::from(max), ramp_secs, hold_secs) as i16
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ramp_u16(elapsed: f64, min: u16, max: u16, ramp_secs: f64, hold_secs: f64) -> u16 {
    ramp(elapsed, f64::from(min), f64::from(max), ramp_secs, hold_secs) as u16
}

/// Look up the data bytes following the SID for a request on `req_id`
/// with service `sid` and sub-function/DID bytes `sub`. Returns `None`
/// for anything outside the simulated catalogue, which the caller turns
/// into `NO DATA`.
#[must_use]
pub fn response_body(req_id: u32, sid: u8, sub: &[u8], start: Instant) -> Option<Vec<u8>> {
    let t = start.elapsed().as_secs_f64();
    match (req_id, sid, sub) {
        (0x797, 0x22, [0x11, 0x03]) => {
            // HV battery voltage, raw * 0.08.
            Some(vec![0x11, 0x03, ramp_u8(t, 180, 235, 6.0, 3.0)])
        }
        (0x797, 0x22, [0x11, 0x06]) => {
            // HV battery current, signed raw / 1024.
            let raw = ramp_i16(t, -800, 1600, 5.0, 2.0).to_be_bytes();
            Some(vec![0x11, 0x06, raw[0], raw[1]])
        }
        (0x797, 0x22, [0x11, 0x12]) => {
            // Battery temp min/max, piecewise raw counters.
            let max = ramp_u8(t, 120, 160, 10.0, 5.0);
            Some(vec![0x11, 0x12, max, max.saturating_sub(12)])
        }
        (0x745, 0x21, [0x01]) => {
            // LV battery voltage (raw * 0.1) and current (raw * 0.5 - 64).
            let v = ramp_u8(t, 132, 142, 8.0, 4.0);
            let c = ramp_u8(t, 96, 160, 8.0, 4.0);
            Some(vec![0x01, v, c])
        }
        (0x79B, 0x21, [0x02]) => {
            // Gear position: forward the whole cycle, never reverse.
            Some(vec![0x02, 0x00, 0x00])
        }
        (0x79B, 0x21, [0x01]) => {
            // Rear torque, signed raw * 0.01.
            let raw = ramp_i16(t, -200, 18_000, 4.0, 2.0).to_be_bytes();
            Some(vec![0x01, raw[0], raw[1]])
        }
        (0x79B, 0x21, [0x03]) => {
            // Speed, unsigned raw * 0.01.
            let raw = ramp_u16(t, 0, 11_000, 6.0, 3.0).to_be_bytes();
            Some(vec![0x03, raw[0], raw[1]])
        }
        (0x797, 0x22, [0x11, 0x20]) => {
            // Aux power, unsigned raw * 0.01.
            let raw = ramp_u16(t, 4_000, 14_000, 5.0, 2.0).to_be_bytes();
            Some(vec![0x11, 0x20, raw[0], raw[1]])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_request_resolves() {
        let start = Instant::now();
        let body = response_body(0x797, 0x22, &[0x11, 0x03], start).unwrap();
        assert_eq!(&body[..2], &[0x11, 0x03]);
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn unknown_request_is_none() {
        let start = Instant::now();
        assert!(response_body(0x123, 0x22, &[0x99], start).is_none());
    }

    #[test]
    fn ramp_stays_within_bounds() {
        for i in 0..200 {
            let v = ramp(f64::from(i) * 0.37, 10.0, 20.0, 3.0, 2.0);
            assert!((10.0..=20.0).contains(&v));
        }
    }
}
