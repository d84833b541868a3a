//! Combustion solver for fuel/air flow targets.
//!
//! Forward relations (stoichiometric air, equivalence ratio, thermal power)
//! and their inverses (volume mode, power mode). All functions are pure and
//! deterministic; a target that cannot be met returns
//! [`CombustionError::InfeasibleTarget`] instead of a clamped answer.
//!
//! Flows are volumetric l/min at STP, power is in watts.
//!
//! φ = stoichiometric air / actual air:
//! - φ = 1 stoichiometric
//! - φ < 1 lean
//! - φ > 1 rich

pub mod bisect;
pub mod error;
pub mod solve;
pub mod stoich;

pub use bisect::{BisectionConfig, BisectionResult, bisect};
pub use error::{CombustionError, CombustionResult};
pub use solve::{FlowBounds, FlowSolution, FuelMix, solve_power, solve_volume};
pub use stoich::{equivalence_ratio, fuel_flow_for_power, stoichiometric_air, thermal_power, total_thermal_power};
