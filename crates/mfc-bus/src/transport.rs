//! Transport collaborator contract.

use async_trait::async_trait;
use mfc_core::{NodeAddress, PortName};

use crate::error::TransportFault;
use crate::protocol::Parameter;

/// Opens physical ports. One implementation per backend (simulated, serial).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open `port` for exclusive use.
    async fn open(&self, port: &PortName) -> Result<Box<dyn PortLink>, TransportFault>;
}

/// An open port. Owned by exactly one arbiter actor, never shared.
#[async_trait]
pub trait PortLink: Send {
    async fn read_parameter(&mut self, node: NodeAddress, parameter: Parameter) -> Result<f64, TransportFault>;

    async fn write_parameter(&mut self, node: NodeAddress, parameter: Parameter, value: f64) -> Result<(), TransportFault>;

    async fn close(&mut self);
}
