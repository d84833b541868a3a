//! Per-device conversion capability, fixed when the device is registered.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CalibrationError, CalibrationResult};
use crate::table::{Calibration, Conversion, Saturation};

/// How a device converts between its own units and real flow.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCurve {
    /// Measured calibration table (shared, immutable).
    Calibrated(Arc<Calibration>),
    /// No calibration: device units are real units, clamped to `[0, device_max]`.
    Identity { device_max: f64 },
}

impl DeviceCurve {
    pub fn calibrated(cal: impl Into<Arc<Calibration>>) -> Self {
        Self::Calibrated(cal.into())
    }

    pub fn identity(device_max: f64) -> CalibrationResult<Self> {
        if !device_max.is_finite() || device_max <= 0.0 {
            return Err(CalibrationError::InvalidDeviceMax { value: device_max });
        }
        Ok(Self::Identity { device_max })
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated(_))
    }

    /// Setpoint in device units for a real flow target.
    pub fn real_to_device(&self, flow: f64) -> Conversion {
        let c = match self {
            Self::Calibrated(cal) => cal.real_to_device(flow),
            Self::Identity { device_max } => clamp(flow, *device_max),
        };
        if let Some(side) = c.saturation {
            warn!(
                requested = flow,
                applied = c.value,
                ?side,
                "flow target outside calibrated range, saturating"
            );
        }
        c
    }

    /// Real flow for a device reading.
    pub fn device_to_real(&self, value: f64) -> Conversion {
        let c = match self {
            Self::Calibrated(cal) => cal.device_to_real(value),
            Self::Identity { device_max } => clamp(value, *device_max),
        };
        if c.is_saturated() {
            debug!(reading = value, clamped = c.value, "device reading outside calibrated range");
        }
        c
    }

    /// Largest real flow the device can be commanded to (l/min).
    pub fn max_real(&self) -> f64 {
        match self {
            Self::Calibrated(cal) => cal.max_real(),
            Self::Identity { device_max } => *device_max,
        }
    }

    /// Smallest real flow the curve covers (l/min).
    pub fn min_real(&self) -> f64 {
        match self {
            Self::Calibrated(cal) => cal.min_real(),
            Self::Identity { .. } => 0.0,
        }
    }

    pub fn is_real_in_range(&self, flow: f64) -> bool {
        (self.min_real()..=self.max_real()).contains(&flow)
    }
}

fn clamp(v: f64, max: f64) -> Conversion {
    if v.is_nan() || v < 0.0 {
        Conversion {
            value: 0.0,
            saturation: Some(Saturation::Below),
        }
    } else if v > max {
        Conversion {
            value: max,
            saturation: Some(Saturation::Above),
        }
    } else {
        Conversion::exact(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_through_within_range() {
        let curve = DeviceCurve::identity(5.0).unwrap();
        let c = curve.real_to_device(2.5);
        assert_eq!(c.value, 2.5);
        assert!(!c.is_saturated());
        assert_eq!(curve.device_to_real(2.5).value, 2.5);
    }

    #[test]
    fn identity_clamps_to_zero_and_device_max() {
        let curve = DeviceCurve::identity(5.0).unwrap();
        assert_eq!(
            curve.real_to_device(7.0),
            Conversion {
                value: 5.0,
                saturation: Some(Saturation::Above)
            }
        );
        assert_eq!(curve.real_to_device(-1.0).value, 0.0);
        assert_eq!(curve.max_real(), 5.0);
    }

    #[test]
    fn identity_rejects_non_positive_max() {
        assert!(DeviceCurve::identity(0.0).is_err());
        assert!(DeviceCurve::identity(f64::NAN).is_err());
    }

    #[test]
    fn calibrated_curve_delegates_to_table() {
        let cal = Calibration::from_pairs(&[(0.0, 0.0), (1.0, 0.325)]).unwrap();
        let curve = DeviceCurve::calibrated(cal);
        assert!(curve.is_calibrated());
        assert_eq!(curve.max_real(), 0.325);
        assert!((curve.real_to_device(0.1625).value - 0.5).abs() < 1e-12);
    }
}
