//! Gas identifiers.

use serde::{Deserialize, Serialize};

use crate::error::GasError;
use crate::properties::{self, GasProperties};

/// Gases a flow controller can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gas {
    /// Hydrogen (H₂)
    H2,
    /// Methane (CH₄)
    CH4,
    /// Carbon monoxide (CO)
    CO,
    /// Propane (C₃H₈)
    C3H8,
    /// Air, the oxidizer
    Air,
    /// Nitrogen (N₂), the factory calibration gas
    N2,
    /// Oxygen (O₂)
    O2,
}

impl Gas {
    pub const ALL: [Gas; 7] = [
        Gas::H2,
        Gas::CH4,
        Gas::CO,
        Gas::C3H8,
        Gas::Air,
        Gas::N2,
        Gas::O2,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Gas::H2 => "H2",
            Gas::CH4 => "CH4",
            Gas::CO => "CO",
            Gas::C3H8 => "C3H8",
            Gas::Air => "Air",
            Gas::N2 => "N2",
            Gas::O2 => "O2",
        }
    }

    pub fn properties(&self) -> &'static GasProperties {
        properties::lookup(*self)
    }

    /// True when the gas has a lower heating value.
    pub fn is_fuel(&self) -> bool {
        self.properties().is_fuel()
    }

    /// Moles of O₂ consumed per mole of fuel, `None` for non-fuels.
    pub fn stoich_o2(&self) -> Option<f64> {
        self.properties().stoich_o2_ratio
    }
}

impl std::fmt::Display for Gas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Gas {
    type Err = GasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "H2" | "HYDROGEN" => Ok(Gas::H2),
            "CH4" | "METHANE" => Ok(Gas::CH4),
            "CO" | "CARBONMONOXIDE" => Ok(Gas::CO),
            "C3H8" | "PROPANE" => Ok(Gas::C3H8),
            "AIR" => Ok(Gas::Air),
            "N2" | "NITROGEN" => Ok(Gas::N2),
            "O2" | "OXYGEN" => Ok(Gas::O2),
            _ => Err(GasError::UnknownGas {
                name: s.to_string(),
            }),
        }
    }
}
