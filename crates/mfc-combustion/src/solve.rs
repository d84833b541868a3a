//! Inverse solvers: volume mode and power mode.

use std::collections::BTreeMap;

use mfc_core::numeric::ensure_positive;
use mfc_core::units::constants::{AIR_TO_O2_RATIO, J_PER_MJ};
use mfc_core::units::{m3ps, to_lpm};
use mfc_gas::{FuelBlend, Gas};
use tracing::debug;

use crate::bisect::{BisectionConfig, bisect};
use crate::error::{CombustionError, CombustionResult};
use crate::stoich::{equivalence_ratio, fuel_flow_for_power, stoich_coefficient, stoichiometric_air, total_thermal_power};

/// Which fuel(s) carry the requested target.
#[derive(Debug, Clone, PartialEq)]
pub enum FuelMix {
    /// One fuel gas; solved in closed form.
    Single(Gas),
    /// Several fuels at fixed volume fractions; solved by bisection.
    Blend(FuelBlend),
}

impl FuelMix {
    fn fractions(&self) -> Vec<(Gas, f64)> {
        match self {
            FuelMix::Single(gas) => vec![(*gas, 1.0)],
            FuelMix::Blend(blend) => blend.iter().collect(),
        }
    }

    pub fn gases(&self) -> Vec<Gas> {
        self.fractions().into_iter().map(|(g, _)| g).collect()
    }
}

/// Upper flow bounds (l/min) per gas, typically the capacity of the bound device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowBounds {
    max: BTreeMap<Gas, f64>,
}

impl FlowBounds {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with(mut self, gas: Gas, max_flow: f64) -> Self {
        self.max.insert(gas, max_flow);
        self
    }

    pub fn set(&mut self, gas: Gas, max_flow: f64) {
        self.max.insert(gas, max_flow);
    }

    pub fn max(&self, gas: Gas) -> Option<f64> {
        self.max.get(&gas).copied()
    }

    fn check(&self, gas: Gas, flow: f64) -> CombustionResult<()> {
        if !flow.is_finite() || flow < 0.0 {
            return Err(CombustionError::InfeasibleTarget {
                reason: format!("{gas} flow would be {flow} l/min"),
            });
        }
        match self.max(gas) {
            Some(max) if flow > max => Err(CombustionError::InfeasibleTarget {
                reason: format!("{gas} needs {flow:.4} l/min, device capacity is {max:.4} l/min"),
            }),
            _ => Ok(()),
        }
    }
}

/// Flows meeting a combustion target, with the achieved values.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    /// Fuel flows (l/min).
    pub fuels: Vec<(Gas, f64)>,
    /// Air flow (l/min).
    pub air: f64,
    /// Achieved equivalence ratio.
    pub phi: f64,
    /// Achieved thermal power (W).
    pub power_w: f64,
    /// Iterations used (0 for closed-form solutions).
    pub iterations: usize,
}

impl FlowSolution {
    pub fn fuel_flow(&self, gas: Gas) -> f64 {
        self.fuels
            .iter()
            .find(|(g, _)| *g == gas)
            .map(|(_, f)| *f)
            .unwrap_or(0.0)
    }

    pub fn total_fuel(&self) -> f64 {
        self.fuels.iter().map(|(_, f)| f).sum()
    }

    /// Total volume flow (l/min).
    pub fn total(&self) -> f64 {
        self.total_fuel() + self.air
    }
}

/// Split `total` l/min into fuel and air at equivalence ratio `phi`.
///
/// Solves the mass balance `F + A = total` together with
/// `phi = 4.762 × s × F / A`, where `s` is the (blend) O₂ coefficient.
pub fn solve_volume(
    total: f64,
    phi: f64,
    mix: &FuelMix,
    bounds: &FlowBounds,
    config: &BisectionConfig,
) -> CombustionResult<FlowSolution> {
    let total = ensure_positive(total, "total flow")?;
    let phi = ensure_positive(phi, "equivalence ratio")?;

    let (fuel_total, iterations) = match mix {
        FuelMix::Single(gas) => (single_fuel_share(total, phi, *gas)?, 0),
        FuelMix::Blend(blend) => match blend.is_single() {
            Some(gas) => (single_fuel_share(total, phi, gas)?, 0),
            None => blend_fuel_share(total, phi, blend, config)?,
        },
    };

    let fuels: Vec<(Gas, f64)> = mix
        .fractions()
        .into_iter()
        .map(|(g, x)| (g, x * fuel_total))
        .collect();
    let air = total - fuel_total;
    finish(fuels, air, bounds, iterations)
}

/// Fuel and air flows releasing `power_w` watts at equivalence ratio `phi`.
///
/// Fuel comes from inverting the thermal power relation; air is the
/// companion flow holding `phi`.
pub fn solve_power(
    power_w: f64,
    phi: f64,
    mix: &FuelMix,
    bounds: &FlowBounds,
) -> CombustionResult<FlowSolution> {
    let power_w = ensure_positive(power_w, "thermal power")?;
    let phi = ensure_positive(phi, "equivalence ratio")?;

    let fuels: Vec<(Gas, f64)> = match mix {
        FuelMix::Single(gas) => vec![(*gas, fuel_flow_for_power(power_w, *gas)?)],
        FuelMix::Blend(blend) => {
            // MJ/m³ of blend -> l/min of blend for the requested watts
            let per_volume = blend.volumetric_heating_value() * J_PER_MJ;
            if per_volume <= 0.0 {
                return Err(CombustionError::InvalidArg {
                    what: "blend has no heating value",
                });
            }
            let blend_flow = to_lpm(m3ps(power_w / per_volume));
            blend.iter().map(|(g, x)| (g, x * blend_flow)).collect()
        }
    };

    let air = companion_air(&fuels, phi)?;
    finish(fuels, air, bounds, 0)
}

/// Air flow holding `phi` for the given fuel flows.
fn companion_air(fuels: &[(Gas, f64)], phi: f64) -> CombustionResult<f64> {
    Ok(stoichiometric_air(fuels)? / phi)
}

fn single_fuel_share(total: f64, phi: f64, gas: Gas) -> CombustionResult<f64> {
    let stoich_factor = AIR_TO_O2_RATIO * stoich_coefficient(gas)?;
    Ok(total / (1.0 + stoich_factor / phi))
}

fn blend_fuel_share(
    total: f64,
    phi: f64,
    blend: &FuelBlend,
    config: &BisectionConfig,
) -> CombustionResult<(f64, usize)> {
    let fractions: Vec<(Gas, f64)> = blend.iter().collect();
    let residual = |fuel_total: f64| {
        let fuels: Vec<(Gas, f64)> = fractions.iter().map(|&(g, x)| (g, x * fuel_total)).collect();
        let air = stoichiometric_air(&fuels).unwrap_or(f64::NAN) / phi;
        fuel_total + air - total
    };
    let r = bisect(residual, 0.0, total, config)?;
    debug!(
        fuel_total = r.x,
        residual = r.residual,
        iterations = r.iterations,
        "blend volume split solved"
    );
    Ok((r.x, r.iterations))
}

fn finish(
    fuels: Vec<(Gas, f64)>,
    air: f64,
    bounds: &FlowBounds,
    iterations: usize,
) -> CombustionResult<FlowSolution> {
    for &(gas, flow) in &fuels {
        bounds.check(gas, flow)?;
    }
    bounds.check(Gas::Air, air)?;

    let phi = equivalence_ratio(&fuels, air)?;
    let power_w = total_thermal_power(&fuels)?;
    Ok(FlowSolution {
        fuels,
        air,
        phi,
        power_w,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BisectionConfig {
        BisectionConfig::default()
    }

    #[test]
    fn volume_mode_single_methane() {
        let sol = solve_volume(1.0, 0.8, &FuelMix::Single(Gas::CH4), &FlowBounds::unbounded(), &cfg()).unwrap();
        assert!((sol.total() - 1.0).abs() < 1e-12);
        assert!((sol.phi - 0.8).abs() < 1e-3);
        assert_eq!(sol.iterations, 0);
        // F = 1 / (1 + 9.524/0.8)
        assert!((sol.fuel_flow(Gas::CH4) - 1.0 / (1.0 + 9.524 / 0.8)).abs() < 1e-12);
    }

    #[test]
    fn volume_mode_hydrogen_matches_closed_form() {
        let sol = solve_volume(2.0, 1.0, &FuelMix::Single(Gas::H2), &FlowBounds::unbounded(), &cfg()).unwrap();
        assert!((sol.fuel_flow(Gas::H2) - 2.0 / (1.0 + 2.381)).abs() < 1e-12);
        assert!((sol.phi - 1.0).abs() < 1e-9);
    }

    #[test]
    fn volume_mode_blend_uses_bisection() {
        let blend = FuelBlend::new(vec![(Gas::H2, 0.5), (Gas::CH4, 0.5)]).unwrap();
        let sol = solve_volume(1.0, 0.9, &FuelMix::Blend(blend), &FlowBounds::unbounded(), &cfg()).unwrap();
        assert!(sol.iterations > 0);
        assert!((sol.total() - 1.0).abs() < 1e-4);
        assert!((sol.phi - 0.9).abs() < 1e-3);
        assert!((sol.fuel_flow(Gas::H2) - sol.fuel_flow(Gas::CH4)).abs() < 1e-12);
    }

    #[test]
    fn capacity_exceeded_is_infeasible() {
        let bounds = FlowBounds::unbounded().with(Gas::Air, 0.5);
        let err = solve_volume(1.0, 0.8, &FuelMix::Single(Gas::CH4), &bounds, &cfg()).unwrap_err();
        assert!(matches!(err, CombustionError::InfeasibleTarget { .. }));
    }

    #[test]
    fn non_positive_targets_rejected() {
        let mix = FuelMix::Single(Gas::CH4);
        assert!(solve_volume(0.0, 0.8, &mix, &FlowBounds::unbounded(), &cfg()).is_err());
        assert!(solve_volume(1.0, -0.8, &mix, &FlowBounds::unbounded(), &cfg()).is_err());
        assert!(solve_power(-5.0, 1.0, &mix, &FlowBounds::unbounded()).is_err());
    }

    #[test]
    fn oxidizer_as_fuel_is_rejected() {
        let err = solve_volume(1.0, 0.8, &FuelMix::Single(Gas::Air), &FlowBounds::unbounded(), &cfg()).unwrap_err();
        assert_eq!(err, CombustionError::NotAFuel { gas: "Air" });
    }

    #[test]
    fn power_mode_single_fuel() {
        let sol = solve_power(300.0, 0.8, &FuelMix::Single(Gas::CH4), &FlowBounds::unbounded()).unwrap();
        assert!((sol.power_w - 300.0).abs() < 1e-6);
        assert!((sol.phi - 0.8).abs() < 1e-9);
        let expected_air = 9.524 * sol.fuel_flow(Gas::CH4) / 0.8;
        assert!((sol.air - expected_air).abs() < 1e-9);
    }

    #[test]
    fn power_mode_blend_hits_power() {
        let blend = FuelBlend::new(vec![(Gas::H2, 0.7), (Gas::CH4, 0.3)]).unwrap();
        let sol = solve_power(400.0, 0.7, &FuelMix::Blend(blend), &FlowBounds::unbounded()).unwrap();
        assert!((sol.power_w - 400.0).abs() < 1e-6);
        assert!((sol.phi - 0.7).abs() < 1e-9);
        let ratio = sol.fuel_flow(Gas::H2) / sol.fuel_flow(Gas::CH4);
        assert!((ratio - 0.7 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn power_mode_over_fuel_capacity_is_infeasible() {
        let bounds = FlowBounds::unbounded().with(Gas::H2, 0.1);
        let err = solve_power(1000.0, 1.0, &FuelMix::Single(Gas::H2), &bounds).unwrap_err();
        assert!(matches!(err, CombustionError::InfeasibleTarget { .. }));
    }
}
