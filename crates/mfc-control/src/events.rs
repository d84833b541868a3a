//! Notifications from the controller to the safety monitor.

use mfc_bus::TransportError;

use crate::config::FaultSeverity;

#[derive(Debug, Clone, PartialEq)]
pub enum SafetyEvent {
    /// A measurement read while Running, with the setpoint it should track.
    Measurement {
        device: String,
        setpoint: f64,
        measured: f64,
    },
    /// A normal-priority round-trip failed and faulted the device.
    TransportFault {
        device: String,
        severity: FaultSeverity,
        error: TransportError,
    },
    /// A mode batch did not reach every device.
    PartialBatchFailure {
        failed: Vec<String>,
        skipped: Vec<String>,
    },
}
