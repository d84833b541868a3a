//! Fuel blends (fixed volume fractions over several fuel gases).

use mfc_core::numeric::{Tolerances, ensure_non_negative, nearly_equal};
use serde::{Deserialize, Serialize};

use crate::error::{GasError, GasResult};
use crate::gas::Gas;

/// Fuel blend defined by normalized volume fractions.
///
/// Fractions always sum to 1.0 and every entry is a fuel gas. Ideal-gas
/// behaviour is assumed, so volume fractions equal mole fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Gas, f64)>", into = "Vec<(Gas, f64)>")]
pub struct FuelBlend {
    items: Vec<(Gas, f64)>,
}

impl FuelBlend {
    /// Blend holding a single fuel.
    pub fn single(gas: Gas) -> GasResult<Self> {
        Self::new(vec![(gas, 1.0)])
    }

    /// Create a blend from (fuel, fraction) pairs.
    ///
    /// Fractions must be finite and non-negative with a positive sum, and
    /// each gas may appear once. The result is normalized to sum=1.
    pub fn new(fractions: Vec<(Gas, f64)>) -> GasResult<Self> {
        if fractions.is_empty() {
            return Err(GasError::InvalidArg { what: "empty blend" });
        }

        let mut sum = 0.0;
        for (i, (gas, frac)) in fractions.iter().enumerate() {
            if !gas.is_fuel() {
                return Err(GasError::NotAFuel { gas: gas.key() });
            }
            if fractions[..i].iter().any(|(g, _)| g == gas) {
                return Err(GasError::InvalidArg {
                    what: "duplicate fuel in blend",
                });
            }
            sum += ensure_non_negative(*frac, "blend fraction")?;
        }

        if sum <= 0.0 || !sum.is_finite() {
            return Err(GasError::NonPhysical {
                what: "blend fractions sum to zero",
            });
        }

        let items: Vec<(Gas, f64)> = fractions
            .into_iter()
            .map(|(g, f)| (g, f / sum))
            .filter(|(_, f)| *f > 1e-15)
            .collect();

        Ok(Self { items })
    }

    /// Volume fraction of `gas` (0.0 if absent).
    pub fn fraction(&self, gas: Gas) -> f64 {
        self.items
            .iter()
            .find(|(g, _)| *g == gas)
            .map(|(_, f)| *f)
            .unwrap_or(0.0)
    }

    /// `Some(gas)` if the blend is a single fuel.
    pub fn is_single(&self) -> Option<Gas> {
        match self.items.as_slice() {
            [(gas, frac)] if nearly_equal(*frac, 1.0, Tolerances::new(1e-10, 1e-10)) => Some(*gas),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gas, f64)> + '_ {
        self.items.iter().copied()
    }

    pub fn gases(&self) -> impl Iterator<Item = Gas> + '_ {
        self.items.iter().map(|(g, _)| *g)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Moles of O₂ per mole of blend: Σ xᵢ·sᵢ.
    pub fn stoich_o2(&self) -> f64 {
        self.items
            .iter()
            .map(|(g, x)| x * g.stoich_o2().unwrap_or(0.0))
            .sum()
    }

    /// Blend heating value per unit volume (MJ/m³): Σ xᵢ·ρᵢ·LHVᵢ.
    pub fn volumetric_heating_value(&self) -> f64 {
        self.items
            .iter()
            .map(|(g, x)| {
                let p = g.properties();
                x * p.density * p.lower_heating_value.unwrap_or(0.0)
            })
            .sum()
    }
}

impl TryFrom<Vec<(Gas, f64)>> for FuelBlend {
    type Error = GasError;

    fn try_from(value: Vec<(Gas, f64)>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FuelBlend> for Vec<(Gas, f64)> {
    fn from(blend: FuelBlend) -> Self {
        blend.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fuel_blend() {
        let blend = FuelBlend::single(Gas::CH4).unwrap();
        assert_eq!(blend.is_single(), Some(Gas::CH4));
        assert_eq!(blend.fraction(Gas::CH4), 1.0);
        assert_eq!(blend.fraction(Gas::H2), 0.0);
        assert!((blend.stoich_o2() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn normalizes_fractions() {
        let blend = FuelBlend::new(vec![(Gas::H2, 3.0), (Gas::CH4, 1.0)]).unwrap();
        assert!((blend.fraction(Gas::H2) - 0.75).abs() < 1e-12);
        assert!((blend.fraction(Gas::CH4) - 0.25).abs() < 1e-12);
        assert!(blend.is_single().is_none());
        // 0.75*0.5 + 0.25*2.0
        assert!((blend.stoich_o2() - 0.875).abs() < 1e-12);
    }

    #[test]
    fn zero_fraction_entries_are_dropped() {
        let blend = FuelBlend::new(vec![(Gas::H2, 1.0), (Gas::CH4, 0.0)]).unwrap();
        assert_eq!(blend.len(), 1);
        assert_eq!(blend.is_single(), Some(Gas::H2));
    }

    #[test]
    fn rejects_oxidizer_and_duplicates() {
        assert!(matches!(
            FuelBlend::new(vec![(Gas::Air, 1.0)]),
            Err(GasError::NotAFuel { gas: "Air" })
        ));
        assert!(FuelBlend::new(vec![(Gas::H2, 1.0), (Gas::H2, 1.0)]).is_err());
    }

    #[test]
    fn rejects_bad_fractions() {
        assert!(FuelBlend::new(vec![]).is_err());
        assert!(FuelBlend::new(vec![(Gas::H2, -0.5)]).is_err());
        assert!(FuelBlend::new(vec![(Gas::H2, f64::NAN)]).is_err());
        assert!(FuelBlend::new(vec![(Gas::H2, 0.0)]).is_err());
    }

    #[test]
    fn volumetric_heating_value_of_methane() {
        let blend = FuelBlend::single(Gas::CH4).unwrap();
        assert!((blend.volumetric_heating_value() - 0.7175 * 50.013).abs() < 1e-9);
    }
}
