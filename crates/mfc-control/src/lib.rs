//! Flow controller coordination: device registry, combustion modes and safety.
//!
//! - [`Controller`] owns the devices and turns commands into bus writes
//! - [`SafetyMonitor`] runs purge and emergency stop and watches deviations
//! - [`MfcSystem`] wires both onto a [`mfc_bus::BusArbiter`] with an explicit
//!   `init` / `shutdown` lifecycle
//!
//! Every device mutation checks the global [`SafetyState`]: ordinary commands
//! are accepted in Idle and Running only.

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod events;
pub mod mode;
pub mod registry;
pub mod safety;
pub mod state;
pub mod system;

pub use config::{ClampPolicy, ControllerConfig, FaultSeverity, FuelPolicy, SafetyConfig, SystemConfig};
pub use controller::Controller;
pub use device::{ConnectionState, DeviceStatus, Mfc};
pub use error::{ControlError, ControlResult, ErrorKind};
pub use events::SafetyEvent;
pub use mode::{BatchReport, OperatingMode, StopReport, StopTrigger};
pub use registry::DeviceRegistry;
pub use safety::{MonitorHandle, SafetyMonitor};
pub use state::{SafetyGate, SafetyState};
pub use system::MfcSystem;
