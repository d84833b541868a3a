//! Knot tables and piecewise-linear conversion.

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, CalibrationResult};

/// One calibration point: what the device shows and the real flow (l/min).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub device: f64,
    pub real: f64,
}

impl Knot {
    pub const fn new(device: f64, real: f64) -> Self {
        Self { device, real }
    }
}

/// Which boundary a conversion was clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saturation {
    Below,
    Above,
}

/// Result of a conversion, with the clamp (if any) that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub value: f64,
    pub saturation: Option<Saturation>,
}

impl Conversion {
    pub(crate) fn exact(value: f64) -> Self {
        Self {
            value,
            saturation: None,
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.saturation.is_some()
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Device,
    Real,
}

impl Axis {
    fn pick(self, k: &Knot) -> f64 {
        match self {
            Axis::Device => k.device,
            Axis::Real => k.real,
        }
    }
}

/// Immutable calibration table, sorted by ascending device value.
///
/// Both coordinates are strictly increasing, so the same knot order serves
/// both conversion directions. Share between devices with `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Knot>", into = "Vec<Knot>")]
pub struct Calibration {
    knots: Vec<Knot>,
}

impl Calibration {
    /// Build a table from knots given in ascending or descending order.
    pub fn new(mut knots: Vec<Knot>) -> CalibrationResult<Self> {
        if knots.len() < 2 {
            return Err(CalibrationError::TooFewKnots { count: knots.len() });
        }
        if let Some(index) = knots
            .iter()
            .position(|k| !k.device.is_finite() || !k.real.is_finite())
        {
            return Err(CalibrationError::NonFinite { index });
        }

        // Lab tables are often recorded from full scale down.
        if knots[0].device > knots[knots.len() - 1].device {
            knots.reverse();
        }

        for (i, pair) in knots.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            if a.device == b.device {
                return Err(CalibrationError::DuplicateDeviceValue { value: a.device });
            }
            if b.device < a.device {
                return Err(CalibrationError::NonMonotonic {
                    axis: "device",
                    index: i + 1,
                });
            }
            if b.real <= a.real {
                return Err(CalibrationError::NonMonotonic {
                    axis: "real",
                    index: i + 1,
                });
            }
        }

        Ok(Self { knots })
    }

    /// Build a table from `(device, real)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> CalibrationResult<Self> {
        Self::new(pairs.iter().map(|&(d, r)| Knot::new(d, r)).collect())
    }

    pub fn knots(&self) -> &[Knot] {
        &self.knots
    }

    /// Device setpoint that yields `flow` real l/min.
    pub fn real_to_device(&self, flow: f64) -> Conversion {
        self.interpolate(flow, Axis::Real, Axis::Device)
    }

    /// Real l/min corresponding to a device reading.
    pub fn device_to_real(&self, value: f64) -> Conversion {
        self.interpolate(value, Axis::Device, Axis::Real)
    }

    pub fn min_real(&self) -> f64 {
        self.first().real
    }

    pub fn max_real(&self) -> f64 {
        self.last().real
    }

    pub fn min_device(&self) -> f64 {
        self.first().device
    }

    pub fn max_device(&self) -> f64 {
        self.last().device
    }

    pub fn is_real_in_range(&self, flow: f64) -> bool {
        (self.min_real()..=self.max_real()).contains(&flow)
    }

    pub fn is_device_in_range(&self, value: f64) -> bool {
        (self.min_device()..=self.max_device()).contains(&value)
    }

    fn first(&self) -> &Knot {
        &self.knots[0]
    }

    fn last(&self) -> &Knot {
        &self.knots[self.knots.len() - 1]
    }

    fn interpolate(&self, x: f64, from: Axis, to: Axis) -> Conversion {
        let (lo, hi) = (self.first(), self.last());
        if x.is_nan() || x < from.pick(lo) {
            return Conversion {
                value: to.pick(lo),
                saturation: Some(Saturation::Below),
            };
        }
        if x > from.pick(hi) {
            return Conversion {
                value: to.pick(hi),
                saturation: Some(Saturation::Above),
            };
        }

        // First knot whose coordinate is >= x; x lies in (idx-1, idx].
        let idx = self.knots.partition_point(|k| from.pick(k) < x);
        if idx == 0 {
            return Conversion::exact(to.pick(lo));
        }
        let (a, b) = (&self.knots[idx - 1], &self.knots[idx]);
        let (x0, x1) = (from.pick(a), from.pick(b));
        if x == x1 {
            return Conversion::exact(to.pick(b));
        }
        let (y0, y1) = (to.pick(a), to.pick(b));
        let t = (x - x0) / (x1 - x0);
        Conversion::exact(y0 + t * (y1 - y0))
    }
}

impl TryFrom<Vec<Knot>> for Calibration {
    type Error = CalibrationError;

    fn try_from(value: Vec<Knot>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Calibration> for Vec<Knot> {
    fn from(cal: Calibration) -> Self {
        cal.knots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch4() -> Calibration {
        Calibration::from_pairs(&[(0.0, 0.0), (0.5, 0.151), (1.0, 0.325)]).unwrap()
    }

    #[test]
    fn interpolates_between_knots() {
        let cal = ch4();
        let c = cal.device_to_real(0.25);
        assert!(!c.is_saturated());
        assert!((c.value - 0.0755).abs() < 1e-12);

        let c = cal.real_to_device(0.151);
        assert!((c.value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn knots_map_exactly() {
        let cal = ch4();
        for k in cal.knots() {
            assert_eq!(cal.device_to_real(k.device).value, k.real);
            assert_eq!(cal.real_to_device(k.real).value, k.device);
        }
    }

    #[test]
    fn clamps_instead_of_extrapolating() {
        let cal = ch4();
        let above = cal.real_to_device(2.0);
        assert_eq!(above.value, 1.0);
        assert_eq!(above.saturation, Some(Saturation::Above));

        let below = cal.device_to_real(-0.3);
        assert_eq!(below.value, 0.0);
        assert_eq!(below.saturation, Some(Saturation::Below));
    }

    #[test]
    fn nan_input_saturates_low() {
        let c = ch4().real_to_device(f64::NAN);
        assert_eq!(c.value, 0.0);
        assert!(c.is_saturated());
    }

    #[test]
    fn descending_input_is_accepted() {
        let cal = Calibration::from_pairs(&[(1.0, 0.325), (0.5, 0.151), (0.0, 0.0)]).unwrap();
        assert_eq!(cal.min_device(), 0.0);
        assert_eq!(cal.max_real(), 0.325);
    }

    #[test]
    fn rejects_invalid_tables() {
        assert_eq!(
            Calibration::from_pairs(&[(0.0, 0.0)]),
            Err(CalibrationError::TooFewKnots { count: 1 })
        );
        assert_eq!(
            Calibration::from_pairs(&[(0.0, 0.0), (0.0, 0.1)]),
            Err(CalibrationError::DuplicateDeviceValue { value: 0.0 })
        );
        assert!(matches!(
            Calibration::from_pairs(&[(0.0, 0.0), (0.5, 0.2), (1.0, 0.1)]),
            Err(CalibrationError::NonMonotonic { axis: "real", .. })
        ));
        assert!(matches!(
            Calibration::from_pairs(&[(0.0, 0.0), (1.0, 0.2), (0.5, 0.3)]),
            Err(CalibrationError::NonMonotonic { axis: "device", .. })
        ));
        assert!(matches!(
            Calibration::from_pairs(&[(0.0, f64::INFINITY), (1.0, 0.2)]),
            Err(CalibrationError::NonFinite { index: 0 })
        ));
    }

    #[test]
    fn range_queries() {
        let cal = ch4();
        assert!(cal.is_real_in_range(0.2));
        assert!(!cal.is_real_in_range(0.4));
        assert!(cal.is_device_in_range(1.0));
        assert!(!cal.is_device_in_range(1.01));
    }
}
