//! Logical flow controller records.

use mfc_calibration::DeviceCurve;
use mfc_core::{NodeAddress, PortName};
use mfc_gas::Gas;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// Last round-trip failed. Excluded from mode batches until a read succeeds.
    Faulted,
}

/// One MFC bound to a (port, node) address.
#[derive(Debug, Clone, PartialEq)]
pub struct Mfc {
    pub name: String,
    pub port: PortName,
    pub node: NodeAddress,
    pub gas: Gas,
    pub curve: DeviceCurve,
    /// Full scale in device units, as read from the device.
    pub capacity: Option<f64>,
    /// Last setpoint written, in l/min.
    pub last_setpoint: Option<f64>,
    /// Last measurement read, in l/min.
    pub last_measurement: Option<f64>,
    pub state: ConnectionState,
}

impl Mfc {
    pub fn new(name: String, port: PortName, node: NodeAddress, gas: Gas, curve: DeviceCurve) -> Self {
        Self {
            name,
            port,
            node,
            gas,
            curve,
            capacity: None,
            last_setpoint: None,
            last_measurement: None,
            state: ConnectionState::Connected,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.state == ConnectionState::Faulted
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            name: self.name.clone(),
            port: self.port.clone(),
            node: self.node,
            gas: self.gas,
            state: self.state,
            calibrated: self.curve.is_calibrated(),
            max_flow: self.curve.max_real(),
            last_setpoint: self.last_setpoint,
            last_measurement: self.last_measurement,
        }
    }
}

/// Snapshot of one device for status listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub port: PortName,
    pub node: NodeAddress,
    pub gas: Gas,
    pub state: ConnectionState,
    pub calibrated: bool,
    /// Largest commandable flow (l/min).
    pub max_flow: f64,
    pub last_setpoint: Option<f64>,
    pub last_measurement: Option<f64>,
}
