//! Shared-bus access for FLOW-BUS style multidrop ports.
//!
//! Several devices (node addresses) hang off one physical port and the bus is
//! half-duplex, so at most one request may be in flight per port. The
//! [`BusArbiter`] owns one actor task per open port; every read or write is a
//! message to that actor, which performs the round-trip through the
//! [`Transport`] with a response timeout and replies on a oneshot channel.
//!
//! # Ordering
//!
//! - Requests on one port run in FIFO order within their priority lane.
//! - [`Priority::Safety`] requests are served before queued normal requests.
//! - Distinct ports run independently.
//!
//! # Transports
//!
//! The byte-level protocol lives behind [`Transport`] / [`PortLink`].
//! [`SimulatedTransport`] models devices in memory for tests and dry runs.

pub mod arbiter;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sim;
pub mod transport;

pub use arbiter::BusArbiter;
pub use config::ArbiterConfig;
pub use error::{BusResult, TransportError, TransportFault};
pub use protocol::{BusRequest, BusResponse, Operation, Parameter, Priority};
pub use sim::{SimFault, SimOp, SimulatedTransport};
pub use transport::{PortLink, Transport};
