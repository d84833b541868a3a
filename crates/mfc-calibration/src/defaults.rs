//! Laboratory calibration tables for the standard gases.
//!
//! Device values are nitrogen-equivalent l/min, real values are measured
//! l/min of the named gas.

use mfc_gas::Gas;

use crate::table::Calibration;

const CH4: &[(f64, f64)] = &[
    (1.0, 0.325),
    (0.9, 0.286),
    (0.8, 0.251),
    (0.7, 0.215),
    (0.6, 0.182),
    (0.5, 0.151),
    (0.4, 0.120),
    (0.3, 0.089),
    (0.2, 0.058),
    (0.1, 0.028),
    (0.0, 0.0),
];

const H2: &[(f64, f64)] = &[
    (2.0, 2.019),
    (1.8, 1.802),
    (1.6, 1.602),
    (1.4, 1.405),
    (1.2, 1.201),
    (1.0, 1.005),
    (0.9, 0.899),
    (0.8, 0.795),
    (0.7, 0.703),
    (0.6, 0.595),
    (0.5, 0.493),
    (0.4, 0.393),
    (0.3, 0.291),
    (0.2, 0.197),
    (0.1, 0.111),
    (0.0, 0.0),
];

const AIR: &[(f64, f64)] = &[
    (1.4, 1.826),
    (1.2, 1.566),
    (1.0, 1.307),
    (0.9, 1.176),
    (0.8, 1.046),
    (0.7, 0.916),
    (0.6, 0.783),
    (0.5, 0.654),
    (0.4, 0.525),
    (0.35, 0.460),
    (0.30, 0.395),
    (0.25, 0.330),
    (0.20, 0.265),
    (0.15, 0.200),
    (0.10, 0.135),
    (0.05, 0.069),
    (0.0, 0.0),
];

/// Built-in table for `gas`, if one exists.
pub fn default_calibration(gas: Gas) -> Option<Calibration> {
    let pairs = match gas {
        Gas::CH4 => CH4,
        Gas::H2 => H2,
        Gas::Air => AIR,
        _ => return None,
    };
    Calibration::from_pairs(pairs).ok()
}
