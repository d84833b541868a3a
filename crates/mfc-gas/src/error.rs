//! Gas catalogue errors.

use mfc_core::CoreError;
use thiserror::Error;

/// Result type for gas catalogue operations.
pub type GasResult<T> = Result<T, GasError>;

/// Errors raised while resolving gases or building blends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GasError {
    /// Identifier does not name a known gas.
    #[error("Unknown gas '{name}'")]
    UnknownGas { name: String },

    /// A gas without a heating value was used where a fuel is required.
    #[error("{gas} is not a fuel")]
    NotAFuel { gas: &'static str },

    /// Invalid argument.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Non-physical value (negative or non-finite fraction).
    #[error("Non-physical value for {what}")]
    NonPhysical { what: &'static str },
}

impl From<CoreError> for GasError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NonFinite { what, .. } | CoreError::Negative { what, .. } => {
                GasError::NonPhysical { what }
            }
            CoreError::InvalidArg { what } => GasError::InvalidArg { what },
            CoreError::NodeAddressRange { .. } => GasError::InvalidArg {
                what: "node address",
            },
        }
    }
}
