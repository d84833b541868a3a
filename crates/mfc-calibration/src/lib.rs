//! Calibration engine for mass flow controllers.
//!
//! MFCs are factory calibrated for nitrogen. When another gas flows, the
//! value the device reports (or accepts as setpoint) differs from the real
//! flow. A [`Calibration`] holds measured (device, real) knots and converts in
//! both directions by piecewise-linear interpolation.
//!
//! # Saturation
//!
//! Inputs outside the calibrated range are clamped to the nearest boundary
//! knot, never extrapolated. Every conversion returns a [`Conversion`] whose
//! `saturation` field reports the clamp, and a `warn` event is logged.
//!
//! # Uncalibrated devices
//!
//! [`DeviceCurve::Identity`] maps device units to real units one-to-one and
//! clamps to `[0, device_max]`.

pub mod curve;
pub mod defaults;
pub mod error;
pub mod table;

pub use curve::DeviceCurve;
pub use defaults::default_calibration;
pub use error::{CalibrationError, CalibrationResult};
pub use table::{Calibration, Conversion, Knot, Saturation};
