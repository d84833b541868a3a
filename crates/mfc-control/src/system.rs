//! Process-wide lifecycle: one controller, one monitor, explicit init and shutdown.

use std::sync::Arc;

use mfc_bus::{BusArbiter, Transport};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::SystemConfig;
use crate::controller::Controller;
use crate::error::ControlResult;
use crate::safety::{MonitorHandle, SafetyMonitor};
use crate::state::SafetyState;

/// The running system handed to front ends.
pub struct MfcSystem {
    controller: Arc<Controller>,
    monitor: Arc<SafetyMonitor>,
    handle: Mutex<Option<MonitorHandle>>,
}

impl MfcSystem {
    /// Wire arbiter, controller and monitor together and start the monitor task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(transport: Arc<dyn Transport>, config: SystemConfig) -> Self {
        let arbiter = Arc::new(BusArbiter::new(transport, config.arbiter));
        let (controller, events) = Controller::new(arbiter, config.controller);
        let controller = Arc::new(controller);
        let monitor = Arc::new(SafetyMonitor::new(Arc::clone(&controller), config.safety));
        let handle = monitor.spawn(events);
        info!("flow control system initialised");
        Self {
            controller,
            monitor,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn monitor(&self) -> &Arc<SafetyMonitor> {
        &self.monitor
    }

    pub fn state(&self) -> SafetyState {
        self.controller.safety_state()
    }

    /// Purge (when an oxidizer device exists and the state allows it), close
    /// every port and stop the monitor.
    ///
    /// Ports are closed even if the purge fails; the purge error is returned.
    pub async fn shutdown(&self) -> ControlResult<()> {
        let oxidizer = &self.monitor.config().oxidizer_device;
        let has_oxidizer = self.controller.device(oxidizer).is_ok();
        let purge = match self.state() {
            SafetyState::Idle | SafetyState::Running if has_oxidizer => self.monitor.purge().await,
            state => {
                warn!(%state, has_oxidizer, "skipping purge on shutdown");
                Ok(())
            }
        };

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.controller.disconnect_all().await;
        info!("flow control system shut down");
        purge
    }
}
