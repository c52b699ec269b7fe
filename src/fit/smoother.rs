//! LOWESS smoothing backed by the `lowess` crate.
//!
//! Cleveland's locally weighted linear regression: tricube weights over the
//! `floor(frac · n)` nearest neighbours (at least 2), then bisquare
//! robustness passes with scale `6 · median|r|`. The crate evaluates every
//! point (`delta = 0`), so the curve has one fitted value per observation.
//!
//! Concentrations span several orders of magnitude (1e-9 .. 1e-4 M). The
//! smoother runs on x mapped affinely onto `[0, 1]`; LOWESS is invariant
//! under that map, and the returned curve carries the original x.

use ::lowess::prelude::{Batch, Bisquare, Lowess as LowessBuilder, LowessError, Tricube};

use crate::domain::Curve;
use crate::error::AppError;

/// Smooth `y` against `x` and return the curve ordered by x.
///
/// Inputs are expected to have passed the fit pre-checks (`fit::fit`);
/// anything the smoother still rejects is reported as a numerical error.
pub fn lowess(x: &[f64], y: &[f64], frac: f64, iterations: usize) -> Result<Curve, AppError> {
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
    let unit_x = to_unit_interval(&xs);

    let result = LowessBuilder::<f64>::new()
        .fraction(frac)
        .iterations(iterations)
        .delta(0.0)
        .weight_function(Tricube)
        .robustness_method(Bisquare)
        .adapter(Batch)
        .build()
        .map_err(smoother_error)?
        .fit(&unit_x, &ys)
        .map_err(smoother_error)?;

    if result.y.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical("LOWESS produced a non-finite fitted value."));
    }

    Ok(Curve { x: xs, y: result.y })
}

fn to_unit_interval(xs: &[f64]) -> Vec<f64> {
    let (Some(&lo), Some(&hi)) = (xs.first(), xs.last()) else {
        return Vec::new();
    };
    let width = if hi > lo { hi - lo } else { 1.0 };
    xs.iter().map(|v| (v - lo) / width).collect()
}

fn smoother_error(e: LowessError) -> AppError {
    AppError::numerical(format!("LOWESS smoother failed: {e}"))
}
