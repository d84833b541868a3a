//! Controller and safety configuration.
//!
//! Plain data with documented defaults. Loading from files is the caller's
//! business; everything here derives serde so any format works.

use std::time::Duration;

use mfc_bus::{ArbiterConfig, TransportFault};
use mfc_combustion::BisectionConfig;
use mfc_gas::{FuelBlend, Gas};
use serde::{Deserialize, Serialize};

/// What to do with a flow target outside the device's calibrated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClampPolicy {
    /// Clamp to the nearest boundary and log a warning.
    #[default]
    Saturate,
    /// Refuse the command with `OutOfRange` before any device I/O.
    Reject,
}

/// Which fuel carries a Volume or Power target.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FuelPolicy {
    /// Use the single fuel gas bound to a device. More than one is ambiguous.
    #[default]
    Auto,
    /// Always use this fuel gas.
    Single(Gas),
    /// Fixed volume fractions across several fuels.
    Blend(FuelBlend),
}

/// How serious a fault is, used to decide whether to escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaultSeverity {
    Minor,
    Major,
    Critical,
}

impl FaultSeverity {
    pub fn of(fault: &TransportFault) -> Self {
        match fault {
            TransportFault::Malformed { .. } => FaultSeverity::Minor,
            TransportFault::Timeout { .. } | TransportFault::Io { .. } => FaultSeverity::Major,
            TransportFault::PortUnavailable { .. } | TransportFault::SessionClosed => FaultSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub clamp_policy: ClampPolicy,
    /// Full scale (l/min) assumed for uncalibrated devices whose capacity
    /// could not be read.
    pub default_capacity_lpm: f64,
    /// Extra attempts for reads. Writes are never retried.
    pub read_retries: u32,
    pub fuel_policy: FuelPolicy,
    pub bisection: BisectionConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            clamp_policy: ClampPolicy::Saturate,
            default_capacity_lpm: 5.0,
            read_retries: 1,
            fuel_policy: FuelPolicy::Auto,
            bisection: BisectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Name of the device that flushes the lines during a purge.
    pub oxidizer_device: String,
    pub purge_flow_lpm: f64,
    pub purge_duration: Duration,
    /// Relative deviation `|measured - setpoint| / setpoint` counted as a breach.
    pub deviation_tolerance: f64,
    /// Setpoints at or below this (l/min) use absolute deviation against the band.
    pub zero_band_lpm: f64,
    /// Consecutive breaches that trigger an emergency stop.
    pub breach_limit: u32,
    pub sample_period: Duration,
    /// Transport faults at or above this severity trigger an emergency stop.
    pub escalate_on: FaultSeverity,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            oxidizer_device: "Air".to_string(),
            purge_flow_lpm: 30.0,
            purge_duration: Duration::from_secs(10),
            deviation_tolerance: 0.05,
            zero_band_lpm: 0.01,
            breach_limit: 3,
            sample_period: Duration::from_secs(1),
            escalate_on: FaultSeverity::Critical,
        }
    }
}

/// Everything needed to bring up an [`crate::MfcSystem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub arbiter: ArbiterConfig,
    pub controller: ControllerConfig,
    pub safety: SafetyConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(FaultSeverity::Minor < FaultSeverity::Major);
        assert!(FaultSeverity::Major < FaultSeverity::Critical);
    }

    #[test]
    fn timeouts_are_major() {
        let fault = TransportFault::Timeout {
            after: Duration::from_millis(500),
        };
        assert_eq!(FaultSeverity::of(&fault), FaultSeverity::Major);
        assert_eq!(
            FaultSeverity::of(&TransportFault::SessionClosed),
            FaultSeverity::Critical
        );
    }

    #[test]
    fn defaults() {
        let c = ControllerConfig::default();
        assert_eq!(c.clamp_policy, ClampPolicy::Saturate);
        assert_eq!(c.read_retries, 1);
        let s = SafetyConfig::default();
        assert_eq!(s.breach_limit, 3);
        assert_eq!(s.oxidizer_device, "Air");
        assert_eq!(s.escalate_on, FaultSeverity::Critical);
    }
}
