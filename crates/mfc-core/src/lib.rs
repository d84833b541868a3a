//! mfc-core: shared foundation for the mfcflow workspace.
//!
//! Contains:
//! - units (uom volume flow type + l/min helpers)
//! - numeric (Real + tolerances + finite/sign checks)
//! - ids (FLOW-BUS node addresses and port names)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
