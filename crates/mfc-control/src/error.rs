//! Controller and safety errors.

use mfc_bus::TransportError;
use mfc_calibration::CalibrationError;
use mfc_combustion::CombustionError;
use mfc_core::{CoreError, NodeAddress, PortName};
use mfc_gas::GasError;
use thiserror::Error;

use crate::state::SafetyState;

pub type ControlResult<T> = Result<T, ControlError>;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any device I/O.
    Validation,
    /// A device did not answer properly.
    Transport,
    /// A safety interlock or escalation.
    Safety,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("A device named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Address {port} node {node} is already used by '{existing}'")]
    DuplicateAddress {
        port: PortName,
        node: NodeAddress,
        existing: String,
    },

    #[error("No device named '{name}'")]
    NotFound { name: String },

    #[error("Flow {flow} l/min for '{name}' is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        flow: f64,
        min: f64,
        max: f64,
    },

    /// The mode cannot be mapped onto the registered devices.
    #[error("Invalid mode: {reason}")]
    InvalidMode { reason: String },

    #[error("Invalid input: {0}")]
    Invalid(#[from] CoreError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Combustion error: {0}")]
    Combustion(#[from] CombustionError),

    #[error("Gas error: {0}")]
    Gas(#[from] GasError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Cannot {action} while {state}")]
    Interlocked {
        state: SafetyState,
        action: &'static str,
    },

    #[error("Safety state cannot move from {from} to {to}")]
    InvalidTransition { from: SafetyState, to: SafetyState },

    #[error("Safety escalation: {reason}")]
    Escalation { reason: String },
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::DuplicateName { .. }
            | ControlError::DuplicateAddress { .. }
            | ControlError::NotFound { .. }
            | ControlError::OutOfRange { .. }
            | ControlError::InvalidMode { .. }
            | ControlError::Invalid(_)
            | ControlError::Calibration(_)
            | ControlError::Combustion(_)
            | ControlError::Gas(_) => ErrorKind::Validation,
            ControlError::Transport(_) => ErrorKind::Transport,
            ControlError::Interlocked { .. }
            | ControlError::InvalidTransition { .. }
            | ControlError::Escalation { .. } => ErrorKind::Safety,
        }
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            ControlError::Combustion(CombustionError::InfeasibleTarget { .. })
        )
    }

    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            ControlError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfc_bus::TransportFault;

    #[test]
    fn kinds() {
        assert_eq!(
            ControlError::NotFound { name: "x".into() }.kind(),
            ErrorKind::Validation
        );
        let t = TransportError::new(PortName::from("COM1"), None, TransportFault::SessionClosed);
        assert_eq!(ControlError::from(t).kind(), ErrorKind::Transport);
        assert_eq!(
            ControlError::Escalation { reason: "x".into() }.kind(),
            ErrorKind::Safety
        );
    }

    #[test]
    fn infeasible_is_validation() {
        let e = ControlError::from(CombustionError::InfeasibleTarget { reason: "too much".into() });
        assert!(e.is_infeasible());
        assert_eq!(e.kind(), ErrorKind::Validation);
    }
}
