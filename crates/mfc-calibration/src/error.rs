//! Calibration errors.

use thiserror::Error;

/// Result type for calibration construction.
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Reasons a knot sequence is rejected. Conversions themselves never fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// Fewer than two knots.
    #[error("Calibration needs at least 2 knots, got {count}")]
    TooFewKnots { count: usize },

    /// Two knots share a device value.
    #[error("Duplicate device value {value} in calibration")]
    DuplicateDeviceValue { value: f64 },

    /// Knots are not strictly monotonic in one of the coordinates.
    #[error("Calibration knots not strictly monotonic in {axis} at index {index}")]
    NonMonotonic { axis: &'static str, index: usize },

    /// NaN or infinite knot coordinate.
    #[error("Non-finite calibration value at index {index}")]
    NonFinite { index: usize },

    /// Identity curve with a non-positive maximum.
    #[error("Invalid device maximum: {value}")]
    InvalidDeviceMax { value: f64 },
}
