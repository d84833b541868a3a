//! Parameter numbers and request/response shapes.

use mfc_core::NodeAddress;

/// Device parameters the core reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Full-scale flow (device units), read-only.
    Capacity,
    /// Measured flow (device units).
    Measure,
    /// Flow setpoint (device units), read/write.
    Setpoint,
}

impl Parameter {
    /// Stable parameter number shared with the transport.
    pub const fn number(self) -> u16 {
        match self {
            Parameter::Capacity => 21,
            Parameter::Measure => 205,
            Parameter::Setpoint => 206,
        }
    }

    pub const fn is_writable(self) -> bool {
        matches!(self, Parameter::Setpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Read(Parameter),
    Write(Parameter, f64),
}

/// One round-trip on the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusRequest {
    pub node: NodeAddress,
    pub op: Operation,
}

impl BusRequest {
    pub fn read(node: NodeAddress, parameter: Parameter) -> Self {
        Self {
            node,
            op: Operation::Read(parameter),
        }
    }

    pub fn write(node: NodeAddress, parameter: Parameter, value: f64) -> Self {
        Self {
            node,
            op: Operation::Write(parameter, value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusResponse {
    Value(f64),
    Ack,
}

impl BusResponse {
    pub fn value(self) -> Option<f64> {
        match self {
            BusResponse::Value(v) => Some(v),
            BusResponse::Ack => None,
        }
    }
}

/// Queue lane for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    /// Emergency and purge writes; jump ahead of queued normal requests.
    Safety,
}
