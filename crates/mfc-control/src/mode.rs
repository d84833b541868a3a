//! Operating modes and per-command outcome reports.

use std::collections::BTreeMap;

use mfc_combustion::FlowSolution;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// One control command. Recomputed on every apply, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Real flow (l/min) per device name.
    Manual(BTreeMap<String, f64>),
    /// Total flow (l/min) split into fuel and air at equivalence ratio `phi`.
    Volume { total_lpm: f64, phi: f64 },
    /// Thermal power (W) at equivalence ratio `phi`.
    Power { watts: f64, phi: f64 },
}

impl OperatingMode {
    pub fn manual<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        OperatingMode::Manual(targets.into_iter().map(|(n, f)| (n.into(), f)).collect())
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperatingMode::Manual(_) => "manual",
            OperatingMode::Volume { .. } => "volume",
            OperatingMode::Power { .. } => "power",
        }
    }
}

/// Per-device outcome of a batch of setpoint writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Devices written, with the real flow applied (l/min).
    pub succeeded: Vec<(String, f64)>,
    pub failed: Vec<(String, ControlError)>,
    /// Faulted devices that were not attempted.
    pub skipped: Vec<String>,
    /// Solver output for Volume and Power modes.
    pub solution: Option<FlowSolution>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn applied(&self, name: &str) -> Option<f64> {
        self.succeeded
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| *f)
    }
}

/// Why an emergency stop happened.
#[derive(Debug, Clone, PartialEq)]
pub enum StopTrigger {
    Manual,
    DeviationBreach {
        device: String,
        setpoint: f64,
        measured: f64,
    },
    TransportFault {
        device: String,
        reason: String,
    },
    PartialBatchFailure {
        failed: Vec<String>,
    },
    PurgeFailure {
        reason: String,
    },
}

/// Outcome of an emergency stop.
#[derive(Debug, Clone, PartialEq)]
pub struct StopReport {
    pub trigger: StopTrigger,
    /// Devices confirmed at zero setpoint.
    pub closed: Vec<String>,
    /// Devices whose zero write failed.
    pub unconfirmed: Vec<(String, ControlError)>,
}

impl StopReport {
    pub fn all_closed(&self) -> bool {
        self.unconfirmed.is_empty()
    }
}
