//! Forward combustion relations.

use mfc_core::numeric::ensure_non_negative;
use mfc_core::units::constants::{AIR_TO_O2_RATIO, J_PER_MJ};
use mfc_core::units::{lpm, m3ps, to_lpm, to_m3ps};
use mfc_gas::Gas;

use crate::error::{CombustionError, CombustionResult};

/// Stoichiometric O₂ coefficient of a fuel gas.
pub(crate) fn stoich_coefficient(gas: Gas) -> CombustionResult<f64> {
    gas.stoich_o2()
        .ok_or(CombustionError::NotAFuel { gas: gas.key() })
}

/// Air flow (l/min) for complete combustion of `fuel_flows`.
///
/// `4.762 × Σ(sᵢ × Vᵢ)`. Ideal gas: equal molar volumes, so volume
/// ratios are mole ratios.
pub fn stoichiometric_air(fuel_flows: &[(Gas, f64)]) -> CombustionResult<f64> {
    let mut o2 = 0.0;
    for &(gas, flow) in fuel_flows {
        let flow = ensure_non_negative(flow, "fuel flow")?;
        o2 += stoich_coefficient(gas)? * flow;
    }
    Ok(AIR_TO_O2_RATIO * o2)
}

/// Equivalence ratio φ = stoichiometric air / actual air.
pub fn equivalence_ratio(fuel_flows: &[(Gas, f64)], air_flow: f64) -> CombustionResult<f64> {
    let air_flow = ensure_non_negative(air_flow, "air flow")?;
    if air_flow == 0.0 {
        return Err(CombustionError::DivisionByZero { what: "air flow" });
    }
    Ok(stoichiometric_air(fuel_flows)? / air_flow)
}

/// Thermal power (W) released by `fuel_flow` l/min of `gas`, based on LHV.
///
/// `flow × (1/60000) × ρ × LHV × 1e6`.
pub fn thermal_power(fuel_flow: f64, gas: Gas) -> CombustionResult<f64> {
    let flow = ensure_non_negative(fuel_flow, "fuel flow")?;
    let props = gas.properties();
    let lhv = props
        .lower_heating_value
        .ok_or(CombustionError::NotAFuel { gas: gas.key() })?;
    Ok(to_m3ps(lpm(flow)) * props.density * lhv * J_PER_MJ)
}

/// Total thermal power (W) of several fuel flows.
pub fn total_thermal_power(fuel_flows: &[(Gas, f64)]) -> CombustionResult<f64> {
    fuel_flows
        .iter()
        .map(|&(gas, flow)| thermal_power(flow, gas))
        .sum()
}

/// Inverse of [`thermal_power`]: fuel flow (l/min) releasing `power_w`.
pub fn fuel_flow_for_power(power_w: f64, gas: Gas) -> CombustionResult<f64> {
    let power_w = ensure_non_negative(power_w, "thermal power")?;
    let props = gas.properties();
    let lhv = props
        .lower_heating_value
        .ok_or(CombustionError::NotAFuel { gas: gas.key() })?;
    let energy_density = props.density * lhv * J_PER_MJ;
    Ok(to_lpm(m3ps(power_w / energy_density)))
}
