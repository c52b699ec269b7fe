//! Outlier bounds and classification over one plate's negative controls.
//!
//! Bounds are `mean ± cutoff · std` (population statistics) computed from the
//! plate's own controls only. Classification and removal use strict
//! comparisons: a value sitting exactly on a bound is kept.
//!
//! Only controls are ever removed. Drug wells that fall outside the
//! control-derived range are the experimental signal, not noise.

use crate::domain::{validate_std_cutoff, Measurement, MeasurementTable, OutlierBounds};
use crate::error::AppError;
use crate::math::{mean, population_std};

/// Result of classifying one plate's controls against its bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierClassification {
    /// Controls with a usable value.
    pub n_controls: usize,
    pub n_outliers: usize,
    /// Controls with a missing value (never classified).
    pub missing_values: usize,
    pub flagged: Vec<Measurement>,
}

/// Compute plate-local outlier bounds from control values.
pub fn compute_bounds(control_values: &[f64], std_cutoff: f64) -> Result<OutlierBounds, AppError> {
    validate_std_cutoff(std_cutoff)?;

    let (Some(m), Some(sd)) = (mean(control_values), population_std(control_values)) else {
        return Err(AppError::empty_input(
            "Cannot compute outlier bounds from zero negative-control values.",
        ));
    };

    let bounds = OutlierBounds {
        upper: m + std_cutoff * sd,
        lower: m - std_cutoff * sd,
    };
    if !(bounds.upper.is_finite() && bounds.lower.is_finite()) {
        return Err(AppError::numerical(format!(
            "Non-finite outlier bounds (mean={m}, std={sd})."
        )));
    }
    Ok(bounds)
}

/// Count and collect the controls lying strictly outside `bounds`.
///
/// `controls` must be the negative-control rows of one plate. Fails when none
/// of them carries a value, since the outlier fraction would be undefined.
pub fn classify_outliers<'a>(
    plate_id: &str,
    controls: impl IntoIterator<Item = &'a Measurement>,
    bounds: &OutlierBounds,
) -> Result<OutlierClassification, AppError> {
    let mut n_controls = 0usize;
    let mut missing_values = 0usize;
    let mut flagged = Vec::new();

    for m in controls {
        match m.value {
            Some(v) => {
                n_controls += 1;
                if bounds.is_outlier(v) {
                    flagged.push(m.clone());
                }
            }
            None => missing_values += 1,
        }
    }

    if n_controls == 0 {
        return Err(AppError::empty_input(format!(
            "Plate '{plate_id}' has no negative-control values; the outlier fraction is undefined."
        )));
    }

    Ok(OutlierClassification {
        n_controls,
        n_outliers: flagged.len(),
        missing_values,
        flagged,
    })
}

/// Drop rows that are negative controls AND outside `bounds`.
pub fn remove_outliers(table: &MeasurementTable, bounds: &OutlierBounds) -> MeasurementTable {
    table.filter(|m| !is_control_outlier(m, bounds))
}

fn is_control_outlier(m: &Measurement, bounds: &OutlierBounds) -> bool {
    m.is_control() && m.value.is_some_and(|v| bounds.is_outlier(v))
}

/// Values of the controls that carry one.
pub fn control_values(table: &MeasurementTable) -> Vec<f64> {
    table.controls().filter_map(|m| m.value).collect()
}
