//! Bracketing root finder for monotone scalar residuals.

use crate::error::{CombustionError, CombustionResult};
use serde::{Deserialize, Serialize};

/// Bisection configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectionConfig {
    /// Absolute residual tolerance
    pub tolerance: f64,
    /// Maximum iterations
    pub max_iterations: usize,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 50,
        }
    }
}

/// Bisection result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BisectionResult {
    /// Root estimate
    pub x: f64,
    /// Residual at `x`
    pub residual: f64,
    /// Iterations used
    pub iterations: usize,
}

/// Find `x` in `[lo, hi]` with `|f(x)| <= tolerance`.
///
/// `f(lo)` and `f(hi)` must bracket a root (opposite signs or one of them zero).
pub fn bisect<F>(f: F, mut lo: f64, mut hi: f64, config: &BisectionConfig) -> CombustionResult<BisectionResult>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite()) || lo > hi {
        return Err(CombustionError::InvalidArg {
            what: "bisection bracket",
        });
    }

    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo.abs() <= config.tolerance {
        return Ok(BisectionResult { x: lo, residual: f_lo, iterations: 0 });
    }
    if f_hi.abs() <= config.tolerance {
        return Ok(BisectionResult { x: hi, residual: f_hi, iterations: 0 });
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(CombustionError::InfeasibleTarget {
            reason: "residual does not change sign over the feasible flow range".to_string(),
        });
    }

    let mut mid = 0.5 * (lo + hi);
    let mut f_mid = f(mid);
    for iter in 1..=config.max_iterations {
        if f_mid.abs() <= config.tolerance {
            return Ok(BisectionResult {
                x: mid,
                residual: f_mid,
                iterations: iter,
            });
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
        f_mid = f(mid);
    }

    Err(CombustionError::NoConvergence {
        iterations: config.max_iterations,
        residual: f_mid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_linear_root() {
        let r = bisect(|x| 3.0 * x - 1.0, 0.0, 1.0, &BisectionConfig::default()).unwrap();
        assert!((r.x - 1.0 / 3.0).abs() < 1e-4);
        assert!(r.residual.abs() <= 1e-4);
        assert!(r.iterations <= 50);
    }

    #[test]
    fn root_at_bracket_end_returns_immediately() {
        let r = bisect(|x| x - 1.0, 0.0, 1.0, &BisectionConfig::default()).unwrap();
        assert_eq!(r.x, 1.0);
        assert_eq!(r.iterations, 0);
    }

    #[test]
    fn no_sign_change_is_infeasible() {
        let err = bisect(|x| x + 1.0, 0.0, 1.0, &BisectionConfig::default()).unwrap_err();
        assert!(matches!(err, CombustionError::InfeasibleTarget { .. }));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let cfg = BisectionConfig {
            tolerance: 1e-30,
            max_iterations: 5,
        };
        let err = bisect(|x| x - 0.3, 0.0, 1.0, &cfg).unwrap_err();
        assert!(matches!(err, CombustionError::NoConvergence { iterations: 5, .. }));
    }
}
