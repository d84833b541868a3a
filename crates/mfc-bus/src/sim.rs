//! In-memory transport for tests and dry runs.
//!
//! Each simulated node tracks a setpoint and a measurement that follows it
//! with first-order lag: `measured += (setpoint - measured) * (1 - exp(-dt / tau))`.
//! Time comes from [`tokio::time::Instant`], so paused-clock tests are
//! deterministic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mfc_core::{NodeAddress, PortName};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::TransportFault;
use crate::protocol::{Operation, Parameter};
use crate::transport::{PortLink, Transport};

/// Full scale reported by nodes that were never configured explicitly.
pub const DEFAULT_SIM_CAPACITY: f64 = 5.0;

/// Failure modes that can be injected per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Writes fail with an I/O error.
    FailWrites,
    /// Reads fail with an I/O error.
    FailReads,
    /// Writes never complete.
    StallWrites,
    /// Reads never complete.
    StallReads,
    /// Reads return garbage, writes are rejected as malformed.
    Malformed,
    /// Every request fails with an I/O error.
    FailAll,
}

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOp {
    pub port: PortName,
    pub node: NodeAddress,
    pub op: Operation,
    pub at: Instant,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
struct SimNode {
    capacity: f64,
    setpoint: f64,
    measured: f64,
    updated: Instant,
    measurement_override: Option<f64>,
    fault: Option<SimFault>,
}

impl SimNode {
    fn new(capacity: f64) -> Self {
        Self {
            capacity,
            setpoint: 0.0,
            measured: 0.0,
            updated: Instant::now(),
            measurement_override: None,
            fault: None,
        }
    }

    fn advance(&mut self, tau: Duration) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.updated).as_secs_f64();
        self.updated = now;
        if tau.is_zero() {
            self.measured = self.setpoint;
            return;
        }
        let alpha = 1.0 - (-dt / tau.as_secs_f64()).exp();
        self.measured += (self.setpoint - self.measured) * alpha;
    }

    fn measurement(&self) -> f64 {
        self.measurement_override.unwrap_or(self.measured)
    }
}

#[derive(Debug, Default)]
struct PortStats {
    open_links: usize,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Debug)]
struct SimState {
    nodes: HashMap<(PortName, NodeAddress), SimNode>,
    ports: HashMap<PortName, PortStats>,
    unavailable: HashMap<PortName, String>,
    ops: Vec<SimOp>,
    latency: Duration,
    time_constant: Duration,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            ports: HashMap::new(),
            unavailable: HashMap::new(),
            ops: Vec::new(),
            latency: Duration::ZERO,
            time_constant: Duration::from_millis(200),
        }
    }
}

impl SimState {
    fn node(&mut self, port: &PortName, node: NodeAddress) -> &mut SimNode {
        self.nodes
            .entry((port.clone(), node))
            .or_insert_with(|| SimNode::new(DEFAULT_SIM_CAPACITY))
    }
}

/// Cheap to clone; clones share the same simulated bus.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-request delay before the node answers.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Measurement time constant. Zero makes measurements track setpoints instantly.
    pub fn with_time_constant(self, tau: Duration) -> Self {
        self.state.lock().time_constant = tau;
        self
    }

    pub fn add_node(&self, port: impl Into<PortName>, node: NodeAddress, capacity: f64) {
        let port = port.into();
        self.state
            .lock()
            .nodes
            .insert((port, node), SimNode::new(capacity));
    }

    pub fn inject(&self, port: &PortName, node: NodeAddress, fault: SimFault) {
        self.state.lock().node(port, node).fault = Some(fault);
    }

    pub fn clear_fault(&self, port: &PortName, node: NodeAddress) {
        self.state.lock().node(port, node).fault = None;
    }

    /// Make `open` on `port` fail until cleared with `None`.
    pub fn set_unavailable(&self, port: &PortName, reason: Option<&str>) {
        let mut state = self.state.lock();
        match reason {
            Some(r) => {
                state.unavailable.insert(port.clone(), r.to_string());
            }
            None => {
                state.unavailable.remove(port);
            }
        }
    }

    /// Pin the measured value regardless of the setpoint, or release it with `None`.
    pub fn set_measurement_override(&self, port: &PortName, node: NodeAddress, value: Option<f64>) {
        self.state.lock().node(port, node).measurement_override = value;
    }

    pub fn setpoint(&self, port: &PortName, node: NodeAddress) -> Option<f64> {
        self.state
            .lock()
            .nodes
            .get(&(port.clone(), node))
            .map(|n| n.setpoint)
    }

    pub fn measured(&self, port: &PortName, node: NodeAddress) -> Option<f64> {
        let mut state = self.state.lock();
        let tau = state.time_constant;
        state.nodes.get_mut(&(port.clone(), node)).map(|n| {
            n.advance(tau);
            n.measurement()
        })
    }

    pub fn ops(&self) -> Vec<SimOp> {
        self.state.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// Values of successful setpoint writes to one node, oldest first.
    pub fn writes_to(&self, port: &PortName, node: NodeAddress) -> Vec<f64> {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| op.succeeded && &op.port == port && op.node == node)
            .filter_map(|op| match op.op {
                Operation::Write(Parameter::Setpoint, v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Highest number of requests ever in flight at once on `port`.
    pub fn max_in_flight(&self, port: &PortName) -> usize {
        self.state
            .lock()
            .ports
            .get(port)
            .map_or(0, |s| s.max_in_flight)
    }

    pub fn open_links(&self, port: &PortName) -> usize {
        self.state.lock().ports.get(port).map_or(0, |s| s.open_links)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn open(&self, port: &PortName) -> Result<Box<dyn PortLink>, TransportFault> {
        let mut state = self.state.lock();
        if let Some(reason) = state.unavailable.get(port) {
            return Err(TransportFault::PortUnavailable {
                reason: reason.clone(),
            });
        }
        state.ports.entry(port.clone()).or_default().open_links += 1;
        debug!(%port, "simulated port opened");
        Ok(Box::new(SimLink {
            port: port.clone(),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

/// Counts a request as in flight until dropped, including when a timeout
/// cancels it mid-way.
struct InFlight {
    port: PortName,
    state: Arc<Mutex<SimState>>,
}

impl InFlight {
    fn enter(port: &PortName, state: &Arc<Mutex<SimState>>) -> Self {
        let mut guard = state.lock();
        let stats = guard.ports.entry(port.clone()).or_default();
        stats.in_flight += 1;
        stats.max_in_flight = stats.max_in_flight.max(stats.in_flight);
        Self {
            port: port.clone(),
            state: Arc::clone(state),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(stats) = self.state.lock().ports.get_mut(&self.port) {
            stats.in_flight = stats.in_flight.saturating_sub(1);
        }
    }
}

enum Step {
    Answer(Result<f64, TransportFault>),
    Stall,
}

struct SimLink {
    port: PortName,
    state: Arc<Mutex<SimState>>,
    closed: bool,
}

impl SimLink {
    async fn round_trip(&mut self, node: NodeAddress, op: Operation) -> Result<f64, TransportFault> {
        if self.closed {
            return Err(TransportFault::SessionClosed);
        }
        let _in_flight = InFlight::enter(&self.port, &self.state);

        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let step = self.apply(node, op);
        match step {
            Step::Answer(result) => result,
            Step::Stall => {
                trace!(port = %self.port, %node, "simulated node stalls");
                std::future::pending::<()>().await;
                Err(TransportFault::SessionClosed)
            }
        }
    }

    fn apply(&self, node: NodeAddress, op: Operation) -> Step {
        let mut state = self.state.lock();
        let tau = state.time_constant;
        let sim = state.node(&self.port, node);
        sim.advance(tau);

        let is_write = matches!(op, Operation::Write(..));
        let step = match (sim.fault, is_write) {
            (Some(SimFault::FailAll), _)
            | (Some(SimFault::FailWrites), true)
            | (Some(SimFault::FailReads), false) => Step::Answer(Err(TransportFault::Io {
                message: format!("simulated failure on node {node}"),
            })),
            (Some(SimFault::StallWrites), true) | (Some(SimFault::StallReads), false) => Step::Stall,
            (Some(SimFault::Malformed), true) => Step::Answer(Err(TransportFault::Malformed {
                detail: "simulated garbage reply".to_string(),
            })),
            (Some(SimFault::Malformed), false) => Step::Answer(Ok(f64::NAN)),
            _ => Step::Answer(match op {
                Operation::Read(Parameter::Capacity) => Ok(sim.capacity),
                Operation::Read(Parameter::Measure) => Ok(sim.measurement()),
                Operation::Read(Parameter::Setpoint) => Ok(sim.setpoint),
                Operation::Write(Parameter::Setpoint, value) => {
                    sim.setpoint = value;
                    Ok(value)
                }
                Operation::Write(parameter, _) => Err(TransportFault::Malformed {
                    detail: format!("parameter {} is read-only", parameter.number()),
                }),
            }),
        };

        let succeeded = matches!(step, Step::Answer(Ok(_)));
        let port = self.port.clone();
        state.ops.push(SimOp {
            port,
            node,
            op,
            at: Instant::now(),
            succeeded,
        });
        step
    }
}

#[async_trait]
impl PortLink for SimLink {
    async fn read_parameter(&mut self, node: NodeAddress, parameter: Parameter) -> Result<f64, TransportFault> {
        self.round_trip(node, Operation::Read(parameter)).await
    }

    async fn write_parameter(&mut self, node: NodeAddress, parameter: Parameter, value: f64) -> Result<(), TransportFault> {
        self.round_trip(node, Operation::Write(parameter, value))
            .await
            .map(|_| ())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(stats) = self.state.lock().ports.get_mut(&self.port) {
            stats.open_links = stats.open_links.saturating_sub(1);
        }
        debug!(port = %self.port, "simulated port closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeAddress {
        NodeAddress::new(n).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn measurement_follows_setpoint_with_lag() {
        let sim = SimulatedTransport::new().with_time_constant(Duration::from_millis(100));
        let port = PortName::from("COM1");
        let mut link = sim.open(&port).await.unwrap();

        link.write_parameter(node(3), Parameter::Setpoint, 4.0).await.unwrap();
        let early = link.read_parameter(node(3), Parameter::Measure).await.unwrap();
        assert!(early < 0.1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let settled = link.read_parameter(node(3), Parameter::Measure).await.unwrap();
        assert!((settled - 4.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unknown_nodes_report_default_capacity() {
        let sim = SimulatedTransport::new();
        let mut link = sim.open(&PortName::from("COM1")).await.unwrap();
        let cap = link.read_parameter(node(9), Parameter::Capacity).await.unwrap();
        assert_eq!(cap, DEFAULT_SIM_CAPACITY);
    }

    #[tokio::test]
    async fn injected_write_failure_is_recorded() {
        let sim = SimulatedTransport::new();
        let port = PortName::from("COM1");
        sim.inject(&port, node(2), SimFault::FailWrites);
        let mut link = sim.open(&port).await.unwrap();

        let err = link.write_parameter(node(2), Parameter::Setpoint, 1.0).await.unwrap_err();
        assert!(matches!(err, TransportFault::Io { .. }));
        assert!(link.read_parameter(node(2), Parameter::Setpoint).await.is_ok());

        let ops = sim.ops();
        assert_eq!(ops.len(), 2);
        assert!(!ops[0].succeeded);
        assert!(sim.writes_to(&port, node(2)).is_empty());
    }

    #[tokio::test]
    async fn capacity_is_read_only() {
        let sim = SimulatedTransport::new();
        let mut link = sim.open(&PortName::from("COM1")).await.unwrap();
        let err = link.write_parameter(node(1), Parameter::Capacity, 3.0).await.unwrap_err();
        assert!(matches!(err, TransportFault::Malformed { .. }));
    }

    #[tokio::test]
    async fn unavailable_port_refuses_open() {
        let sim = SimulatedTransport::new();
        let port = PortName::from("COM7");
        sim.set_unavailable(&port, Some("no such device"));
        assert!(matches!(
            sim.open(&port).await,
            Err(TransportFault::PortUnavailable { .. })
        ));
        sim.set_unavailable(&port, None);
        assert!(sim.open(&port).await.is_ok());
        assert_eq!(sim.open_links(&port), 1);
    }

    #[tokio::test]
    async fn override_pins_measurement() {
        let sim = SimulatedTransport::new().with_time_constant(Duration::ZERO);
        let port = PortName::from("COM1");
        let mut link = sim.open(&port).await.unwrap();
        link.write_parameter(node(4), Parameter::Setpoint, 2.0).await.unwrap();
        sim.set_measurement_override(&port, node(4), Some(0.5));
        assert_eq!(link.read_parameter(node(4), Parameter::Measure).await.unwrap(), 0.5);
        sim.set_measurement_override(&port, node(4), None);
        assert_eq!(link.read_parameter(node(4), Parameter::Measure).await.unwrap(), 2.0);
    }
}
