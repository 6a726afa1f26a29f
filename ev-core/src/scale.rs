//! Table-driven numeric scale transforms (§9 Design Notes: "scale
//! transforms" re-architected as descriptors instead of ad-hoc per-PID
//! arithmetic).

/// Signedness of a raw integer field extracted from a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    Unsigned,
    Signed,
}

/// Describes how to pull one physical quantity out of a response payload:
/// byte offset, width, signedness, and a linear `raw * scale + bias`
/// transform.
#[derive(Debug, Clone, Copy)]
pub struct ScaleEntry {
    pub offset: usize,
    pub width: usize,
    pub signedness: Signedness,
    pub scale: f32,
    pub bias: f32,
}

impl ScaleEntry {
    #[must_use]
    pub const fn new(offset: usize, width: usize, signedness: Signedness, scale: f32, bias: f32) -> Self {
        Self {
            offset,
            width,
            signedness,
            scale,
            bias,
        }
    }

    /// Extract and scale the value this entry describes from `data`.
    /// Returns `None` if the payload is too short.
    #[must_use]
    pub fn apply(&self, data: &[u8]) -> Option<f32> {
        if data.len() < self.offset + self.width {
            return None;
        }
        let mut raw: u32 = 0;
        for &b in &data[self.offset..self.offset + self.width] {
            raw = (raw << 8) | u32::from(b);
        }
        let value = match self.signedness {
            Signedness::Unsigned => raw as f32,
            Signedness::Signed => {
                let bits = self.width * 8;
                let sign_bit = 1u32 << (bits - 1);
                if raw & sign_bit != 0 {
                    (raw as i64 - (1i64 << bits)) as f32
                } else {
                    raw as f32
                }
            }
        };
        Some(value * self.scale + self.bias)
    }
}

/// A monotonic breakpoint table for piecewise-linear transforms, used for
/// the non-linear battery temperature curve some platforms report as a
/// raw counter rather than a direct physical unit.
#[derive(Debug, Clone, Copy)]
pub struct PiecewiseTable<'a> {
    /// `(raw, celsius)` pairs, sorted ascending by `raw`.
    pub breakpoints: &'a [(f32, f32)],
}

impl<'a> PiecewiseTable<'a> {
    #[must_use]
    pub fn interpolate(&self, raw: f32) -> f32 {
        let bp = self.breakpoints;
        if bp.is_empty() {
            return 0.0;
        }
        if raw <= bp[0].0 {
            return bp[0].1;
        }
        if raw >= bp[bp.len() - 1].0 {
            return bp[bp.len() - 1].1;
        }
        for window in bp.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if raw >= x0 && raw <= x1 {
                let t = (raw - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        bp[bp.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_scale() {
        let e = ScaleEntry::new(3, 1, Signedness::Unsigned, 0.08, 0.0);
        assert!((e.apply(&[0, 0, 0, 0xB4]).unwrap() - 14.40).abs() < 1e-3);
    }

    #[test]
    fn signed_negative() {
        let e = ScaleEntry::new(0, 2, Signedness::Signed, 1.0, 0.0);
        // -1 as i16 big-endian
        assert_eq!(e.apply(&[0xFF, 0xFF]).unwrap(), -1.0);
    }

    #[test]
    fn piecewise_interpolates_between_breakpoints() {
        let table = PiecewiseTable {
            breakpoints: &[(0.0, -40.0), (100.0, 0.0), (200.0, 60.0)],
        };
        assert_eq!(table.interpolate(50.0), -20.0);
        assert_eq!(table.interpolate(150.0), 30.0);
        assert_eq!(table.interpolate(-5.0), -40.0);
        assert_eq!(table.interpolate(1000.0), 60.0);
    }
}
