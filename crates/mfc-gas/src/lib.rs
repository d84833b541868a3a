//! mfc-gas: gas catalogue for flow control and combustion.
//!
//! Provides:
//! - `Gas`, a closed set of the gases a device can be bound to
//! - `GasProperties`, an immutable process-wide property table (STP values)
//! - `FuelBlend`, a normalized volume-fraction table over fuel gases
//!
//! Per-gas behaviour is resolved through `Gas` when a device is constructed,
//! never by name at call time.

pub mod blend;
pub mod error;
pub mod gas;
pub mod properties;

pub use blend::FuelBlend;
pub use error::{GasError, GasResult};
pub use gas::Gas;
pub use properties::GasProperties;
