#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mfc_bus::{ArbiterConfig, BusArbiter, SimulatedTransport};
use mfc_control::{Controller, ControllerConfig, SafetyEvent};
use mfc_core::{NodeAddress, PortName};
use mfc_gas::Gas;
use tokio::sync::mpsc::UnboundedReceiver;

pub const FUEL_NODE: u8 = 3;
pub const AIR_NODE: u8 = 5;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn node(n: u8) -> NodeAddress {
    NodeAddress::new(n).unwrap()
}

pub fn com1() -> PortName {
    PortName::from("COM1")
}

pub struct Rig {
    pub sim: SimulatedTransport,
    pub controller: Arc<Controller>,
    pub events: UnboundedReceiver<SafetyEvent>,
}

impl Rig {
    pub fn new(config: ControllerConfig) -> Self {
        Self::on(SimulatedTransport::new().with_time_constant(Duration::ZERO), config)
    }

    pub fn on(sim: SimulatedTransport, config: ControllerConfig) -> Self {
        init_tracing();
        let arbiter = Arc::new(BusArbiter::new(Arc::new(sim.clone()), ArbiterConfig::default()));
        let (controller, events) = Controller::new(arbiter, config);
        Self {
            sim,
            controller: Arc::new(controller),
            events,
        }
    }

    /// Methane on node 3 and air on node 5, both on COM1, uncalibrated.
    pub async fn with_burner(config: ControllerConfig) -> Self {
        Self::burner_on(SimulatedTransport::new().with_time_constant(Duration::ZERO), config).await
    }

    pub async fn burner_on(sim: SimulatedTransport, config: ControllerConfig) -> Self {
        let rig = Self::on(sim, config);
        rig.controller
            .add_device("CH4", com1(), node(FUEL_NODE), Gas::CH4, None)
            .await
            .unwrap();
        rig.controller
            .add_device("Air", com1(), node(AIR_NODE), Gas::Air, None)
            .await
            .unwrap();
        rig
    }

    pub fn drain_events(&mut self) -> Vec<SafetyEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            out.push(e);
        }
        out
    }

    pub fn setpoint(&self, n: u8) -> Option<f64> {
        self.sim.setpoint(&com1(), node(n))
    }

    pub fn writes(&self, n: u8) -> Vec<f64> {
        self.sim.writes_to(&com1(), node(n))
    }
}
