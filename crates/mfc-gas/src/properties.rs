//! Gas property table.
//!
//! Values are at STP (0 °C, 1 atm). The table is `const` data and needs no
//! initialisation or locking.

use crate::gas::Gas;

/// Physical properties of one gas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasProperties {
    /// Density at STP (kg/m³).
    pub density: f64,
    /// Molar mass (g/mol).
    pub molar_mass: f64,
    /// Lower heating value (MJ/kg), `None` for non-fuels.
    pub lower_heating_value: Option<f64>,
    /// Dynamic viscosity at STP (Pa·s).
    pub dynamic_viscosity: f64,
    /// Moles of O₂ per mole of fuel for complete combustion.
    pub stoich_o2_ratio: Option<f64>,
}

impl GasProperties {
    pub fn is_fuel(&self) -> bool {
        matches!(self.lower_heating_value, Some(lhv) if lhv > 0.0)
    }
}

// H2 + 0.5 O2 -> H2O
const HYDROGEN: GasProperties = GasProperties {
    density: 0.0899,
    molar_mass: 2.02,
    lower_heating_value: Some(120.0),
    dynamic_viscosity: 8.377e-6,
    stoich_o2_ratio: Some(0.5),
};

// CH4 + 2 O2 -> CO2 + 2 H2O
const METHANE: GasProperties = GasProperties {
    density: 0.7175,
    molar_mass: 16.04,
    lower_heating_value: Some(50.013),
    dynamic_viscosity: 1.03945e-5,
    stoich_o2_ratio: Some(2.0),
};

// CO + 0.5 O2 -> CO2
const CARBON_MONOXIDE: GasProperties = GasProperties {
    density: 1.250,
    molar_mass: 28.01,
    lower_heating_value: Some(10.1),
    dynamic_viscosity: 1.66e-5,
    stoich_o2_ratio: Some(0.5),
};

// C3H8 + 5 O2 -> 3 CO2 + 4 H2O
const PROPANE: GasProperties = GasProperties {
    density: 2.011,
    molar_mass: 44.10,
    lower_heating_value: Some(46.35),
    dynamic_viscosity: 7.5e-6,
    stoich_o2_ratio: Some(5.0),
};

const AIR: GasProperties = GasProperties {
    density: 1.293,
    molar_mass: 28.96,
    lower_heating_value: None,
    dynamic_viscosity: 1.722e-5,
    stoich_o2_ratio: None,
};

const NITROGEN: GasProperties = GasProperties {
    density: 1.2506,
    molar_mass: 28.01,
    lower_heating_value: None,
    dynamic_viscosity: 1.663e-5,
    stoich_o2_ratio: None,
};

const OXYGEN: GasProperties = GasProperties {
    density: 1.429,
    molar_mass: 32.00,
    lower_heating_value: None,
    dynamic_viscosity: 1.919e-5,
    stoich_o2_ratio: None,
};

pub(crate) fn lookup(gas: Gas) -> &'static GasProperties {
    match gas {
        Gas::H2 => &HYDROGEN,
        Gas::CH4 => &METHANE,
        Gas::CO => &CARBON_MONOXIDE,
        Gas::C3H8 => &PROPANE,
        Gas::Air => &AIR,
        Gas::N2 => &NITROGEN,
        Gas::O2 => &OXYGEN,
    }
}
