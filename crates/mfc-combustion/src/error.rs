//! Error types for combustion calculations.

use mfc_core::CoreError;
use mfc_gas::GasError;
use thiserror::Error;

/// Errors from the forward relations and the inverse solvers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CombustionError {
    #[error("Division by zero: {what}")]
    DivisionByZero { what: &'static str },

    #[error("{gas} is not a fuel")]
    NotAFuel { gas: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// The request is well-formed but physically impossible with the bound devices.
    #[error("Infeasible target: {reason}")]
    InfeasibleTarget { reason: String },

    #[error("Solver did not converge after {iterations} iterations (residual {residual})")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("Gas error: {0}")]
    Gas(#[from] GasError),
}

pub type CombustionResult<T> = Result<T, CombustionError>;

impl From<CoreError> for CombustionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NonFinite { what, .. }
            | CoreError::Negative { what, .. }
            | CoreError::InvalidArg { what } => CombustionError::InvalidArg { what },
            CoreError::NodeAddressRange { .. } => CombustionError::InvalidArg {
                what: "node address",
            },
        }
    }
}
