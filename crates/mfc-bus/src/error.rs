//! Transport error types.

use std::time::Duration;

use mfc_core::{NodeAddress, PortName};
use thiserror::Error;

/// What went wrong on the wire.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportFault {
    /// The port could not be opened.
    #[error("port unavailable: {reason}")]
    PortUnavailable { reason: String },

    /// No response within the configured timeout.
    #[error("no response within {after:?}")]
    Timeout { after: Duration },

    /// A response arrived but could not be interpreted.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },

    /// Lower-level I/O failure reported by the transport.
    #[error("I/O failure: {message}")]
    Io { message: String },

    /// The port session was closed while the request was pending.
    #[error("port session closed")]
    SessionClosed,
}

/// A transport failure attributed to a port and (when known) a node.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("transport error on {port}{}: {cause}", .node.map(|n| format!(" node {n}")).unwrap_or_default())]
pub struct TransportError {
    pub port: PortName,
    pub node: Option<NodeAddress>,
    pub cause: TransportFault,
}

impl TransportError {
    pub fn new(port: PortName, node: Option<NodeAddress>, cause: TransportFault) -> Self {
        Self { port, node, cause }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, TransportFault::Timeout { .. })
    }

    pub fn is_port_unavailable(&self) -> bool {
        matches!(self.cause, TransportFault::PortUnavailable { .. })
    }
}

pub type BusResult<T> = Result<T, TransportError>;
