//! Supervisory safety monitor: purge, emergency stop, deviation watch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mfc_bus::Priority;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{FaultSeverity, SafetyConfig};
use crate::controller::Controller;
use crate::device::Mfc;
use crate::error::{ControlError, ControlResult};
use crate::events::SafetyEvent;
use crate::mode::{StopReport, StopTrigger};
use crate::state::SafetyState;

/// Watches the controller and forces devices to a safe state when needed.
///
/// All writes it issues use [`Priority::Safety`], so they overtake queued
/// normal commands on every port.
pub struct SafetyMonitor {
    controller: Arc<Controller>,
    config: SafetyConfig,
    breaches: Mutex<HashMap<String, u32>>,
    last_stop: Mutex<Option<StopReport>>,
}

impl SafetyMonitor {
    pub fn new(controller: Arc<Controller>, config: SafetyConfig) -> Self {
        Self {
            controller,
            config,
            breaches: Mutex::new(HashMap::new()),
            last_stop: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn state(&self) -> SafetyState {
        self.controller.safety_state()
    }

    /// Report of the most recent emergency stop.
    pub fn last_stop(&self) -> Option<StopReport> {
        self.last_stop.lock().clone()
    }

    /// Idle -> Running. Deviation monitoring is active from here on.
    pub fn start(&self) -> ControlResult<()> {
        self.controller.gate().transition(SafetyState::Running)?;
        self.breaches.lock().clear();
        Ok(())
    }

    /// Manual reset out of EmergencyStopped.
    pub fn reset(&self) -> ControlResult<()> {
        let from = self.state();
        if from != SafetyState::EmergencyStopped {
            return Err(ControlError::InvalidTransition {
                from,
                to: SafetyState::Idle,
            });
        }
        self.controller.gate().transition(SafetyState::Idle)?;
        self.breaches.lock().clear();
        info!("emergency stop reset");
        Ok(())
    }

    /// Flush the fuel lines with oxidizer, then return to Idle.
    ///
    /// Fuels go to zero, the oxidizer device runs at the purge flow for the
    /// purge duration and is closed again. Any failed write escalates to an
    /// emergency stop. If someone else stops the system mid-sequence the
    /// purge issues no further commands and leaves the oxidizer closed.
    pub async fn purge(&self) -> ControlResult<()> {
        let oxidizer = self.controller.device(&self.config.oxidizer_device)?;
        self.controller.gate().transition(SafetyState::Purging)?;
        warn!(
            oxidizer = %oxidizer.name,
            flow = self.config.purge_flow_lpm,
            duration = ?self.config.purge_duration,
            "purge started"
        );

        let fuels = self
            .controller
            .snapshot()
            .into_iter()
            .filter(|d| d.gas.is_fuel());
        for device in fuels {
            self.ensure_purging()?;
            if let Err(e) = self
                .controller
                .write_setpoint(&device, 0.0, Priority::Safety)
                .await
            {
                return Err(self
                    .abort_purge(format!("could not close fuel device '{}': {e}", device.name))
                    .await);
            }
        }

        self.ensure_purging()?;
        if let Err(e) = self
            .controller
            .write_setpoint(&oxidizer, self.config.purge_flow_lpm, Priority::Safety)
            .await
        {
            return Err(self
                .abort_purge(format!("could not open oxidizer '{}': {e}", oxidizer.name))
                .await);
        }

        if let Err(e) = self.hold(self.config.purge_duration).await {
            self.close_oxidizer(&oxidizer).await;
            return Err(e);
        }

        if let Err(e) = self
            .controller
            .write_setpoint(&oxidizer, 0.0, Priority::Safety)
            .await
        {
            return Err(self
                .abort_purge(format!("could not close oxidizer '{}': {e}", oxidizer.name))
                .await);
        }

        self.controller
            .gate()
            .transition_from(SafetyState::Purging, SafetyState::Idle)?;
        info!("purge complete");
        Ok(())
    }

    /// Zero every registered device, Faulted ones included.
    ///
    /// Writes run independently so one stuck device cannot hold up the
    /// others. Always completes; failures land in `unconfirmed`.
    pub async fn emergency_stop(&self, trigger: StopTrigger) -> StopReport {
        if let Err(e) = self
            .controller
            .gate()
            .transition(SafetyState::EmergencyStopped)
        {
            error!(error = %e, "could not record emergency stop state");
        }
        error!(?trigger, "EMERGENCY STOP");

        let mut writes = JoinSet::new();
        for device in self.controller.snapshot() {
            let controller = Arc::clone(&self.controller);
            writes.spawn(async move {
                let result = controller
                    .write_setpoint(&device, 0.0, Priority::Safety)
                    .await;
                (device.name, result)
            });
        }

        let mut closed = Vec::new();
        let mut unconfirmed = Vec::new();
        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((name, Ok(_))) => closed.push(name),
                Ok((name, Err(e))) => {
                    error!(device = %name, error = %e, "device not confirmed closed");
                    unconfirmed.push((name, e));
                }
                Err(e) => error!(error = %e, "emergency stop write task failed"),
            }
        }
        closed.sort();
        unconfirmed.sort_by(|a, b| a.0.cmp(&b.0));

        self.breaches.lock().clear();
        let report = StopReport {
            trigger,
            closed,
            unconfirmed,
        };
        if report.all_closed() {
            info!(devices = report.closed.len(), "all devices closed");
        }
        *self.last_stop.lock() = Some(report.clone());
        report
    }

    /// Feed one measurement into the deviation check.
    ///
    /// Only counts while Running. `breach_limit` consecutive breaches on the
    /// same device trigger an emergency stop, whose report is returned.
    pub async fn observe(&self, device: &str, setpoint: f64, measured: f64) -> Option<StopReport> {
        if self.state() != SafetyState::Running {
            return None;
        }
        let breach = self.is_breach(setpoint, measured);
        let count = {
            let mut breaches = self.breaches.lock();
            let count = breaches.entry(device.to_string()).or_insert(0);
            *count = if breach { *count + 1 } else { 0 };
            *count
        };
        if !breach {
            return None;
        }
        warn!(
            device,
            setpoint,
            measured,
            count,
            limit = self.config.breach_limit,
            "flow deviation"
        );
        if count < self.config.breach_limit.max(1) {
            return None;
        }
        let trigger = StopTrigger::DeviationBreach {
            device: device.to_string(),
            setpoint,
            measured,
        };
        Some(self.emergency_stop(trigger).await)
    }

    fn is_breach(&self, setpoint: f64, measured: f64) -> bool {
        let diff = (measured - setpoint).abs();
        if setpoint.abs() > self.config.zero_band_lpm {
            diff / setpoint.abs() > self.config.deviation_tolerance
        } else {
            diff > self.config.zero_band_lpm
        }
    }

    /// React to one controller notification.
    pub async fn handle(&self, event: SafetyEvent) -> Option<StopReport> {
        match event {
            SafetyEvent::Measurement {
                device,
                setpoint,
                measured,
            } => self.observe(&device, setpoint, measured).await,
            SafetyEvent::TransportFault {
                device,
                severity,
                error,
            } => {
                if !self.should_escalate(severity) {
                    warn!(%device, ?severity, %error, "transport fault below escalation threshold");
                    return None;
                }
                let trigger = StopTrigger::TransportFault {
                    device,
                    reason: error.to_string(),
                };
                Some(self.emergency_stop(trigger).await)
            }
            SafetyEvent::PartialBatchFailure { failed, skipped } => {
                if failed.is_empty() || !self.should_escalate(FaultSeverity::Major) {
                    warn!(?failed, ?skipped, "partial batch failure");
                    return None;
                }
                Some(
                    self.emergency_stop(StopTrigger::PartialBatchFailure { failed })
                        .await,
                )
            }
        }
    }

    fn should_escalate(&self, severity: FaultSeverity) -> bool {
        severity >= self.config.escalate_on && self.state() != SafetyState::EmergencyStopped
    }

    /// Read every device that has a setpoint. Measurements reach
    /// [`Self::observe`] through the controller's event stream.
    pub async fn sample(&self) {
        if self.state() != SafetyState::Running {
            return;
        }
        for device in self.controller.snapshot() {
            if device.last_setpoint.is_none() || device.is_faulted() {
                continue;
            }
            if let Err(e) = self.controller.read_flow_real(&device.name).await {
                debug!(device = %device.name, error = %e, "sample read failed");
            }
        }
    }

    /// True when every device reads within the zero band.
    pub async fn check_all_flows_zero(&self) -> bool {
        let mut all_zero = true;
        for (name, flow) in self.controller.read_all_flows().await {
            match flow {
                Ok(f) if f.abs() <= self.config.zero_band_lpm => {}
                Ok(f) => {
                    warn!(device = %name, flow = f, "flow not zero");
                    all_zero = false;
                }
                Err(e) => {
                    warn!(device = %name, error = %e, "could not confirm zero flow");
                    all_zero = false;
                }
            }
        }
        all_zero
    }

    /// Run the monitor in the background until the handle is stopped or dropped.
    pub fn spawn(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<SafetyEvent>) -> MonitorHandle {
        let monitor = Arc::clone(self);
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let period = monitor.config.sample_period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            monitor.handle(event).await;
                        }
                        None => break,
                    },
                    _ = tick.tick() => monitor.sample().await,
                }
            }
            debug!("safety monitor stopped");
        });
        MonitorHandle { stop, task }
    }

    /// Wait out the purge, ending early once the state leaves Purging.
    async fn hold(&self, duration: Duration) -> ControlResult<()> {
        let mut rx = self.controller.gate().subscribe();
        let interrupted = async {
            loop {
                let state = *rx.borrow_and_update();
                if state != SafetyState::Purging {
                    return state;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            state = interrupted => {
                warn!(%state, "purge interrupted");
                Err(ControlError::Interlocked {
                    state,
                    action: "purge",
                })
            }
        }
    }

    fn ensure_purging(&self) -> ControlResult<()> {
        match self.state() {
            SafetyState::Purging => Ok(()),
            state => Err(ControlError::Interlocked {
                state,
                action: "purge",
            }),
        }
    }

    async fn close_oxidizer(&self, oxidizer: &Mfc) {
        if let Err(e) = self
            .controller
            .write_setpoint(oxidizer, 0.0, Priority::Safety)
            .await
        {
            error!(device = %oxidizer.name, error = %e, "could not close oxidizer after interrupted purge");
        }
    }

    async fn abort_purge(&self, reason: String) -> ControlError {
        error!(%reason, "purge failed, escalating");
        self.emergency_stop(StopTrigger::PurgeFailure {
            reason: reason.clone(),
        })
        .await;
        ControlError::Escalation { reason }
    }
}

/// Background monitor task. Dropping the handle also stops the task.
pub struct MonitorHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub async fn stop(self) {
        if self.stop.send(()).is_err() {
            debug!("safety monitor already stopped");
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "safety monitor task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
