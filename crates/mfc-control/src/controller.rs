//! Device registry front end: setpoints, reads and mode batches.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mfc_bus::{BusArbiter, BusResult, Parameter, Priority, TransportError};
use mfc_calibration::{Calibration, DeviceCurve};
use mfc_combustion::{CombustionError, FlowBounds, FlowSolution, FuelMix, solve_power, solve_volume};
use mfc_core::numeric::ensure_finite;
use mfc_core::{CoreError, NodeAddress, PortName};
use mfc_gas::Gas;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ClampPolicy, ControllerConfig, FaultSeverity, FuelPolicy};
use crate::device::{ConnectionState, DeviceStatus, Mfc};
use crate::error::{ControlError, ControlResult};
use crate::events::SafetyEvent;
use crate::mode::{BatchReport, OperatingMode};
use crate::registry::DeviceRegistry;
use crate::state::{SafetyGate, SafetyState};

/// Owns the device registry and routes every command through the bus arbiter.
///
/// The registry lock is never held across an await: each operation copies
/// what it needs, does the I/O, then records the outcome.
pub struct Controller {
    arbiter: Arc<BusArbiter>,
    registry: RwLock<DeviceRegistry>,
    config: ControllerConfig,
    gate: Arc<SafetyGate>,
    events: mpsc::UnboundedSender<SafetyEvent>,
}

/// Targets resolved from a mode, before any I/O.
struct Plan {
    targets: Vec<(Mfc, f64)>,
    solution: Option<FlowSolution>,
}

impl Controller {
    /// Build a controller; the receiver carries events for the safety monitor.
    pub fn new(arbiter: Arc<BusArbiter>, config: ControllerConfig) -> (Self, mpsc::UnboundedReceiver<SafetyEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            arbiter,
            registry: RwLock::new(DeviceRegistry::new()),
            config,
            gate: Arc::new(SafetyGate::new()),
            events,
        };
        (controller, rx)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<SafetyGate> {
        &self.gate
    }

    pub fn arbiter(&self) -> &Arc<BusArbiter> {
        &self.arbiter
    }

    pub fn safety_state(&self) -> SafetyState {
        self.gate.current()
    }

    // ---- registry ----

    /// Register a device and open (or reuse) its port.
    ///
    /// Without a calibration the device gets an identity curve scaled to the
    /// capacity it reports. A failed capacity read registers it as Faulted.
    pub async fn add_device(
        &self,
        name: impl Into<String>,
        port: impl Into<PortName>,
        node: NodeAddress,
        gas: Gas,
        calibration: Option<Calibration>,
    ) -> ControlResult<()> {
        let name = name.into();
        let port = port.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidArg {
                what: "device name must not be empty",
            }
            .into());
        }
        self.registry.read().check_free(&name, &port, node)?;
        self.arbiter.open(&port).await?;

        let capacity = match self.read_with_retries(&port, node, Parameter::Capacity).await {
            Ok(c) if c > 0.0 => Some(c),
            Ok(c) => {
                warn!(device = %name, capacity = c, "device reports non-positive capacity");
                None
            }
            Err(e) => {
                warn!(device = %name, error = %e, "capacity read failed");
                None
            }
        };

        let curve = match calibration {
            Some(cal) => DeviceCurve::calibrated(cal),
            None => DeviceCurve::identity(capacity.unwrap_or(self.config.default_capacity_lpm))?,
        };
        let mut device = Mfc::new(name.clone(), port.clone(), node, gas, curve);
        device.capacity = capacity;
        if capacity.is_none() {
            device.state = ConnectionState::Faulted;
        }
        let state = device.state;

        let inserted = self.registry.write().insert(device);
        if let Err(e) = inserted {
            self.release_port_if_unused(&port).await;
            return Err(e);
        }
        info!(device = %name, %port, %node, %gas, ?state, "device added");
        Ok(())
    }

    /// Zero the device (best effort), forget it, and close its port if no
    /// other device uses it.
    pub async fn remove_device(&self, name: &str) -> ControlResult<()> {
        let device = self.device(name)?;
        if let Err(e) = self.write_setpoint(&device, 0.0, Priority::Normal).await {
            warn!(device = name, error = %e, "could not zero device before removal");
        }
        self.registry.write().remove(name)?;
        self.release_port_if_unused(&device.port).await;
        info!(device = name, port = %device.port, "device removed");
        Ok(())
    }

    /// Close every port and forget every device. Safe to call repeatedly.
    pub async fn disconnect_all(&self) -> Vec<DeviceStatus> {
        let drained = self.registry.write().drain();
        self.arbiter.close_all().await;
        if !drained.is_empty() {
            info!(devices = drained.len(), "all devices disconnected");
        }
        drained
            .into_iter()
            .map(|mut d| {
                d.state = ConnectionState::Disconnected;
                d.status()
            })
            .collect()
    }

    /// Copy of one device record.
    pub fn device(&self, name: &str) -> ControlResult<Mfc> {
        self.registry.read().get(name).cloned()
    }

    pub fn device_names(&self) -> Vec<String> {
        self.registry.read().iter().map(|d| d.name.clone()).collect()
    }

    pub fn status(&self) -> Vec<DeviceStatus> {
        self.registry.read().iter().map(Mfc::status).collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Mfc> {
        self.registry.read().iter().cloned().collect()
    }

    // ---- single device ----

    /// Command a real flow (l/min). Returns the flow actually applied after clamping.
    pub async fn set_flow_real(&self, name: &str, flow: f64) -> ControlResult<f64> {
        self.gate.ensure_commands_allowed("set flow")?;
        let flow = ensure_finite(flow, "flow")?;
        let device = self.device(name)?;
        self.check_range(&device, flow)?;

        let applied = self.write_setpoint(&device, flow, Priority::Normal).await?;
        self.undo_if_interlocked(std::slice::from_ref(&device), "set flow")
            .await?;
        Ok(applied)
    }

    /// Measured real flow (l/min). A successful read clears a fault.
    pub async fn read_flow_real(&self, name: &str) -> ControlResult<f64> {
        let device = self.device(name)?;
        let raw = self.read_device(&device, Parameter::Measure).await?;
        let flow = device.curve.device_to_real(raw).value;

        let setpoint = {
            let mut reg = self.registry.write();
            match reg.get_mut(name) {
                Ok(d) => {
                    d.last_measurement = Some(flow);
                    d.last_setpoint
                }
                Err(_) => None,
            }
        };
        if let (SafetyState::Running, Some(setpoint)) = (self.gate.current(), setpoint) {
            self.emit(SafetyEvent::Measurement {
                device: name.to_string(),
                setpoint,
                measured: flow,
            });
        }
        Ok(flow)
    }

    /// Setpoint as the device reports it, in real flow (l/min).
    pub async fn read_setpoint_real(&self, name: &str) -> ControlResult<f64> {
        let device = self.device(name)?;
        let raw = self.read_device(&device, Parameter::Setpoint).await?;
        Ok(device.curve.device_to_real(raw).value)
    }

    /// Reopen the port if needed and re-read capacity. Clears a fault on success.
    pub async fn reconnect(&self, name: &str) -> ControlResult<f64> {
        let device = self.device(name)?;
        self.arbiter.open(&device.port).await?;
        let capacity = self.read_device(&device, Parameter::Capacity).await?;

        if let Ok(d) = self.registry.write().get_mut(name) {
            d.capacity = Some(capacity);
            if !d.curve.is_calibrated() {
                match DeviceCurve::identity(capacity) {
                    Ok(curve) => d.curve = curve,
                    Err(e) => warn!(device = name, error = %e, "keeping previous range"),
                }
            }
        }
        info!(device = name, capacity, "device reconnected");
        Ok(capacity)
    }

    // ---- batches ----

    /// Resolve `mode` into per-device targets and write them.
    ///
    /// Validation (unknown names, infeasible targets, range policy) happens
    /// before any write. Faulted devices are skipped; the report lists every
    /// device's outcome and the safety monitor hears about any gap.
    pub async fn apply_mode(&self, mode: &OperatingMode) -> ControlResult<BatchReport> {
        self.gate.ensure_commands_allowed("apply mode")?;
        let devices = self.snapshot();
        let plan = self.plan(mode, &devices)?;
        for (device, flow) in &plan.targets {
            self.check_range(device, *flow)?;
        }

        let mut report = BatchReport {
            solution: plan.solution,
            ..BatchReport::default()
        };
        let mut written = Vec::new();
        for (device, flow) in plan.targets {
            if device.is_faulted() {
                debug!(device = %device.name, "skipping faulted device");
                report.skipped.push(device.name);
                continue;
            }
            match self.write_setpoint(&device, flow, Priority::Normal).await {
                Ok(applied) => {
                    report.succeeded.push((device.name.clone(), applied));
                    written.push(device);
                }
                Err(e) => report.failed.push((device.name, e)),
            }
        }
        self.undo_if_interlocked(&written, "apply mode").await?;

        if report.is_complete() {
            info!(mode = mode.label(), devices = report.succeeded.len(), "mode applied");
        } else {
            warn!(
                mode = mode.label(),
                failed = ?report.failed_names(),
                skipped = ?report.skipped,
                "mode applied partially"
            );
            self.emit(SafetyEvent::PartialBatchFailure {
                failed: report.failed_names(),
                skipped: report.skipped.clone(),
            });
        }
        Ok(report)
    }

    /// Zero every device, continuing past failures.
    pub async fn close_all_valves(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for device in self.snapshot() {
            match self.write_setpoint(&device, 0.0, Priority::Normal).await {
                Ok(applied) => report.succeeded.push((device.name, applied)),
                Err(e) => report.failed.push((device.name, e)),
            }
        }
        report
    }

    /// Read every device's measured flow.
    pub async fn read_all_flows(&self) -> Vec<(String, ControlResult<f64>)> {
        let mut out = Vec::new();
        for name in self.device_names() {
            let flow = self.read_flow_real(&name).await;
            out.push((name, flow));
        }
        out
    }

    // ---- internals ----

    /// Convert, write and record one setpoint. Returns the real flow applied.
    ///
    /// A failed write faults the device. Only normal-priority failures are
    /// reported to the safety monitor; safety writes report through their caller.
    pub(crate) async fn write_setpoint(&self, device: &Mfc, flow: f64, priority: Priority) -> ControlResult<f64> {
        let (device_value, applied) = setpoint_for(&device.curve, flow);
        debug!(device = %device.name, flow = applied, device_value, ?priority, "writing setpoint");

        let result = self
            .arbiter
            .write(&device.port, device.node, Parameter::Setpoint, device_value, priority)
            .await;
        match result {
            Ok(()) => {
                if let Ok(d) = self.registry.write().get_mut(&device.name) {
                    d.last_setpoint = Some(applied);
                }
                Ok(applied)
            }
            Err(e) => {
                self.mark_faulted(&device.name, &e, priority == Priority::Normal);
                Err(e.into())
            }
        }
    }

    async fn read_device(&self, device: &Mfc, parameter: Parameter) -> ControlResult<f64> {
        match self
            .read_with_retries(&device.port, device.node, parameter)
            .await
        {
            Ok(raw) => {
                if let Ok(d) = self.registry.write().get_mut(&device.name) {
                    if d.state != ConnectionState::Connected {
                        info!(device = %device.name, "device fault cleared");
                        d.state = ConnectionState::Connected;
                    }
                }
                Ok(raw)
            }
            Err(e) => {
                self.mark_faulted(&device.name, &e, true);
                Err(e.into())
            }
        }
    }

    /// Reads are idempotent, so they are retried up to the configured count.
    async fn read_with_retries(&self, port: &PortName, node: NodeAddress, parameter: Parameter) -> BusResult<f64> {
        let attempts = self.config.read_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.arbiter.read(port, node, parameter, Priority::Normal).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    debug!(%port, %node, attempt, error = %e, "read failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn mark_faulted(&self, name: &str, error: &TransportError, notify: bool) {
        let severity = FaultSeverity::of(&error.cause);
        if let Ok(d) = self.registry.write().get_mut(name) {
            d.state = ConnectionState::Faulted;
        }
        warn!(device = name, %error, ?severity, "device faulted");
        if notify {
            self.emit(SafetyEvent::TransportFault {
                device: name.to_string(),
                severity,
                error: error.clone(),
            });
        }
    }

    fn emit(&self, event: SafetyEvent) {
        if self.events.send(event).is_err() {
            debug!("no safety monitor listening");
        }
    }

    async fn release_port_if_unused(&self, port: &PortName) {
        let in_use = self.registry.read().port_in_use(port);
        if !in_use {
            self.arbiter.close(port).await;
        }
    }

    fn check_range(&self, device: &Mfc, flow: f64) -> ControlResult<()> {
        if self.config.clamp_policy == ClampPolicy::Saturate || flow == 0.0 {
            return Ok(());
        }
        if device.curve.is_real_in_range(flow) {
            Ok(())
        } else {
            Err(ControlError::OutOfRange {
                name: device.name.clone(),
                flow,
                min: device.curve.min_real(),
                max: device.curve.max_real(),
            })
        }
    }

    /// A stop can land between our state check and the write reaching the
    /// bus. If that happened, close what we just opened and refuse.
    async fn undo_if_interlocked(&self, written: &[Mfc], action: &'static str) -> ControlResult<()> {
        let state = self.gate.current();
        if state.permits_commands() {
            return Ok(());
        }
        warn!(%state, action, devices = written.len(), "state changed during command, closing again");
        for device in written {
            if let Err(e) = self.write_setpoint(device, 0.0, Priority::Safety).await {
                warn!(device = %device.name, error = %e, "could not re-close device");
            }
        }
        Err(ControlError::Interlocked { state, action })
    }

    fn plan(&self, mode: &OperatingMode, devices: &[Mfc]) -> ControlResult<Plan> {
        match mode {
            OperatingMode::Manual(targets) => plan_manual(targets, devices),
            OperatingMode::Volume { total_lpm, phi } => {
                let setup = self.combustion_setup(devices)?;
                let solution = solve_volume(*total_lpm, *phi, &setup.mix, &setup.bounds, &self.config.bisection)?;
                Ok(setup.into_plan(solution, devices))
            }
            OperatingMode::Power { watts, phi } => {
                let setup = self.combustion_setup(devices)?;
                let solution = solve_power(*watts, *phi, &setup.mix, &setup.bounds)?;
                Ok(setup.into_plan(solution, devices))
            }
        }
    }

    fn combustion_setup<'a>(&self, devices: &'a [Mfc]) -> ControlResult<CombustionSetup<'a>> {
        let mix = self.fuel_mix(devices)?;
        let air = only_device_for(devices, Gas::Air)?;
        let mut bounds = FlowBounds::unbounded().with(Gas::Air, air.curve.max_real());
        let mut fuels = Vec::new();
        for gas in mix.gases() {
            let device = only_device_for(devices, gas)?;
            bounds.set(gas, device.curve.max_real());
            fuels.push(device);
        }
        Ok(CombustionSetup {
            mix,
            bounds,
            air,
            fuels,
        })
    }

    fn fuel_mix(&self, devices: &[Mfc]) -> ControlResult<FuelMix> {
        match &self.config.fuel_policy {
            FuelPolicy::Single(gas) => Ok(FuelMix::Single(*gas)),
            FuelPolicy::Blend(blend) => Ok(match blend.is_single() {
                Some(gas) => FuelMix::Single(gas),
                None => FuelMix::Blend(blend.clone()),
            }),
            FuelPolicy::Auto => {
                let fuels: BTreeSet<Gas> = devices
                    .iter()
                    .map(|d| d.gas)
                    .filter(Gas::is_fuel)
                    .collect();
                let mut it = fuels.iter();
                match (it.next(), it.next()) {
                    (None, _) => Err(ControlError::InvalidMode {
                        reason: "no fuel device registered".to_string(),
                    }),
                    (Some(gas), None) => Ok(FuelMix::Single(*gas)),
                    (Some(_), Some(_)) => {
                        let names: Vec<&str> = fuels.iter().map(Gas::key).collect();
                        Err(CombustionError::InfeasibleTarget {
                            reason: format!(
                                "several fuels registered ({}) and no blend configured",
                                names.join(", ")
                            ),
                        }
                        .into())
                    }
                }
            }
        }
    }
}

struct CombustionSetup<'a> {
    mix: FuelMix,
    bounds: FlowBounds,
    air: &'a Mfc,
    fuels: Vec<&'a Mfc>,
}

impl CombustionSetup<'_> {
    /// Idle fuels first, then air, then the active fuels.
    fn into_plan(self, solution: FlowSolution, devices: &[Mfc]) -> Plan {
        let active: BTreeSet<Gas> = self.fuels.iter().map(|d| d.gas).collect();
        let mut targets: Vec<(Mfc, f64)> = devices
            .iter()
            .filter(|d| d.gas.is_fuel() && !active.contains(&d.gas))
            .map(|d| (d.clone(), 0.0))
            .collect();
        targets.push((self.air.clone(), solution.air));
        for device in self.fuels {
            targets.push((device.clone(), solution.fuel_flow(device.gas)));
        }
        debug!(
            air = solution.air,
            fuel = solution.total_fuel(),
            phi = solution.phi,
            power_w = solution.power_w,
            "combustion targets resolved"
        );
        Plan {
            targets,
            solution: Some(solution),
        }
    }
}

fn plan_manual(targets: &BTreeMap<String, f64>, devices: &[Mfc]) -> ControlResult<Plan> {
    let mut out = Vec::with_capacity(targets.len());
    for (name, flow) in targets {
        let device = devices
            .iter()
            .find(|d| &d.name == name)
            .ok_or_else(|| ControlError::NotFound { name: name.clone() })?;
        let flow = ensure_finite(*flow, "flow")?;
        out.push((device.clone(), flow));
    }
    Ok(Plan {
        targets: out,
        solution: None,
    })
}

fn only_device_for(devices: &[Mfc], gas: Gas) -> ControlResult<&Mfc> {
    let bound: Vec<&Mfc> = devices.iter().filter(|d| d.gas == gas).collect();
    match bound.as_slice() {
        [one] => Ok(*one),
        [] => Err(ControlError::InvalidMode {
            reason: format!("no device bound to {gas}"),
        }),
        many => {
            let names: Vec<&str> = many.iter().map(|d| d.name.as_str()).collect();
            Err(ControlError::InvalidMode {
                reason: format!("several devices bound to {gas}: {}", names.join(", ")),
            })
        }
    }
}

/// Device value and applied real flow for a target. Zero always means a
/// closed valve (device value 0).
fn setpoint_for(curve: &DeviceCurve, flow: f64) -> (f64, f64) {
    if flow == 0.0 {
        return (0.0, 0.0);
    }
    let c = curve.real_to_device(flow);
    let applied = curve.device_to_real(c.value).value;
    (c.value, applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfc_calibration::default_calibration;

    #[test]
    fn zero_is_a_closed_valve() {
        let curve = DeviceCurve::identity(5.0).unwrap();
        assert_eq!(setpoint_for(&curve, 0.0), (0.0, 0.0));
    }

    #[test]
    fn saturated_target_reports_applied_flow() {
        let curve = DeviceCurve::identity(5.0).unwrap();
        assert_eq!(setpoint_for(&curve, 7.5), (5.0, 5.0));
    }

    #[test]
    fn calibrated_target_converts() {
        let curve = DeviceCurve::calibrated(default_calibration(Gas::CH4).unwrap());
        let (device, applied) = setpoint_for(&curve, 0.151);
        assert!((device - 0.5).abs() < 1e-12);
        assert!((applied - 0.151).abs() < 1e-12);
    }

    #[test]
    fn only_device_for_rejects_ambiguity() {
        let mk = |name: &str, node: u8| {
            Mfc::new(
                name.to_string(),
                PortName::from("COM1"),
                NodeAddress::new(node).unwrap(),
                Gas::Air,
                DeviceCurve::identity(5.0).unwrap(),
            )
        };
        let devices = vec![mk("air1", 1), mk("air2", 2)];
        assert!(matches!(
            only_device_for(&devices, Gas::Air),
            Err(ControlError::InvalidMode { .. })
        ));
        assert!(matches!(
            only_device_for(&devices, Gas::CH4),
            Err(ControlError::InvalidMode { .. })
        ));
        assert_eq!(only_device_for(&devices[..1], Gas::Air).unwrap().name, "air1");
    }
}
