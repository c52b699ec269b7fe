//! Curve-fit model registry.
//!
//! `FitAlgorithm` (see `domain`) names the registered algorithms; this module
//! maps each one to its `CurveModel` implementation. Name parsing and the
//! unsupported-model error live with `FitAlgorithm::from_name`, so adding an
//! algorithm only means adding a variant plus an implementation here.

use crate::domain::{Curve, FitAlgorithm};
use crate::error::AppError;
use crate::fit::smoother::lowess;

/// Number of robustifying re-weighting passes after the initial LOWESS fit.
pub const ROBUST_ITERATIONS: usize = 3;

/// A smoother that maps concentration/response pairs to an ordered curve.
pub trait CurveModel: Sync {
    /// Fit `y` against `x` using the given neighbourhood fraction.
    fn fit(&self, x: &[f64], y: &[f64], locality: f64) -> Result<Curve, AppError>;
}

/// Locally weighted scatterplot smoothing with bisquare robustness passes.
#[derive(Debug, Clone, Copy)]
pub struct Lowess {
    pub iterations: usize,
}

impl CurveModel for Lowess {
    fn fit(&self, x: &[f64], y: &[f64], locality: f64) -> Result<Curve, AppError> {
        lowess(x, y, locality, self.iterations)
    }
}

static LOWESS: Lowess = Lowess {
    iterations: ROBUST_ITERATIONS,
};

impl FitAlgorithm {
    /// The implementation registered for this algorithm.
    pub fn model(self) -> &'static dyn CurveModel {
        match self {
            FitAlgorithm::Lowess => &LOWESS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_algorithm_resolves_by_name() {
        for alg in FitAlgorithm::ALL {
            assert_eq!(FitAlgorithm::from_name(alg.name()).unwrap(), alg);
            let curve = alg.model().fit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 1.0).unwrap();
            assert_eq!(curve.len(), 3);
        }
    }
}
