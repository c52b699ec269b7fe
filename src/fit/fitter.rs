//! Per-group dose-response fitting.
//!
//! Every `(plate_id, row)` compound group is fitted twice from the same
//! normalized snapshot:
//!
//! - production locality `2/3` (the curve used downstream)
//! - reference locality `1.0` (a smoother overlay used to judge the fit)
//!
//! Groups are independent, so they are fitted in parallel; the output keeps
//! the groups' first-appearance order and the first failing group aborts.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;

use crate::domain::{Curve, FitAlgorithm, FitResult, NormalizedMeasurement, PlateRowKey};
use crate::error::AppError;

/// Neighbourhood fraction of the production curve.
pub const PRODUCTION_LOCALITY: f64 = 2.0 / 3.0;

/// Neighbourhood fraction of the reference (test) curve.
pub const REFERENCE_LOCALITY: f64 = 1.0;

/// Fit one concentration/response series with the chosen algorithm.
///
/// The checks here apply to every registered algorithm, so implementations
/// only see well-formed input.
pub fn fit(model: FitAlgorithm, x: &[f64], y: &[f64], locality: f64) -> Result<Curve, AppError> {
    validate_locality(locality)?;
    validate_xy(x, y)?;
    model.model().fit(x, y, locality)
}

/// Equal lengths, finite values and at least two distinct x-values.
pub fn validate_xy(x: &[f64], y: &[f64]) -> Result<(), AppError> {
    if x.len() != y.len() {
        return Err(AppError::invalid_data(format!(
            "x and y lengths differ ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(AppError::invalid_data("Non-finite value in fit input."));
    }
    let distinct = distinct_concentrations(x);
    if distinct < 2 {
        return Err(AppError::insufficient_data(format!(
            "Need at least 2 distinct concentrations to fit a curve, found {distinct}"
        )));
    }
    Ok(())
}

pub fn validate_locality(locality: f64) -> Result<(), AppError> {
    if !(locality.is_finite() && locality > 0.0 && locality <= 1.0) {
        return Err(AppError::configuration(format!(
            "Invalid locality fraction ({locality}); it must lie in (0, 1]."
        )));
    }
    Ok(())
}

fn distinct_concentrations(x: &[f64]) -> usize {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Fit the production and reference curves for one compound group.
pub fn fit_group(
    model: FitAlgorithm,
    key: &PlateRowKey,
    chem_id: &str,
    points: &[NormalizedMeasurement],
) -> Result<FitResult, AppError> {
    let x: Vec<f64> = points.iter().map(|p| p.chem_concentration).collect();
    let y: Vec<f64> = points.iter().map(|p| p.value_norm).collect();

    let with_group = |e: AppError| AppError::new(e.kind(), format!("{key} ({chem_id}): {}", e.message()));

    let production = fit(model, &x, &y, PRODUCTION_LOCALITY).map_err(with_group)?;
    let reference = fit(model, &x, &y, REFERENCE_LOCALITY).map_err(with_group)?;

    debug!("Fitted {key} ({chem_id}) with {model}: {} points", points.len());

    Ok(FitResult {
        key: key.clone(),
        chem_id: chem_id.to_string(),
        model,
        production,
        reference,
    })
}

/// Split normalized rows into `(plate_id, row)` groups, in first-appearance order.
pub fn group_normalized(normalized: &[NormalizedMeasurement]) -> Vec<(PlateRowKey, Vec<NormalizedMeasurement>)> {
    let mut index: HashMap<PlateRowKey, usize> = HashMap::new();
    let mut groups: Vec<(PlateRowKey, Vec<NormalizedMeasurement>)> = Vec::new();
    for n in normalized {
        let slot = *index.entry(n.key.clone()).or_insert_with(|| {
            groups.push((n.key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(n.clone());
    }
    groups
}

/// Fit every compound group.
///
/// `chem_ids` supplies the compound identifier for each group (the report
/// join key); a group without one is invalid data.
pub fn fit_all(
    model: FitAlgorithm,
    normalized: &[NormalizedMeasurement],
    chem_ids: &HashMap<PlateRowKey, String>,
) -> Result<Vec<FitResult>, AppError> {
    let groups = group_normalized(normalized);

    groups
        .par_iter()
        .map(|(key, points)| {
            let chem_id = chem_ids.get(key).ok_or_else(|| {
                AppError::invalid_data(format!("{key} has no compound identifier"))
            })?;
            fit_group(model, key, chem_id, points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn point(plate: &str, row: &str, conc: f64, value_norm: f64) -> NormalizedMeasurement {
        NormalizedMeasurement {
            key: PlateRowKey::new(plate, row),
            chem_id: Some("O-1".to_string()),
            chem_concentration: conc,
            value: 0.0,
            value_norm,
        }
    }

    fn variance(v: &[f64]) -> f64 {
        let m = v.iter().sum::<f64>() / v.len() as f64;
        v.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / v.len() as f64
    }

    fn step_variance(curve: &Curve) -> f64 {
        let steps: Vec<f64> = curve.y.windows(2).map(|w| w[1] - w[0]).collect();
        variance(&steps)
    }

    #[test]
    fn reference_curve_is_smoother_than_production() {
        // Half-decade dilution series with a wavy response and alternating noise.
        let points: Vec<NormalizedMeasurement> = (0..17)
            .map(|i| {
                let conc = 1e-9 * 10f64.powf(i as f64 / 4.0);
                let wave = 0.8 * (i as f64 / 16.0 * std::f64::consts::TAU).sin();
                let noise = if i % 2 == 1 { 0.15 } else { -0.15 };
                point("P1", "2", conc, wave + noise)
            })
            .collect();

        let fit = fit_group(FitAlgorithm::Lowess, &PlateRowKey::new("P1", "2"), "O-1", &points).unwrap();
        assert!(step_variance(&fit.reference) < step_variance(&fit.production));

        let x_min = points.first().unwrap().chem_concentration;
        let x_max = points.last().unwrap().chem_concentration;
        assert_eq!(fit.production.x_range(), Some((x_min, x_max)));
        assert_eq!(fit.reference.x_range(), Some((x_min, x_max)));
        assert!(fit.production.x.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn single_concentration_is_insufficient() {
        let points = vec![point("P1", "1", 1e-6, 0.1), point("P1", "1", 1e-6, 0.2)];
        let err = fit_group(FitAlgorithm::Lowess, &PlateRowKey::new("P1", "1"), "O-1", &points).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.message().contains("plate 'P1', row '1'"));
    }

    #[test]
    fn fit_all_keeps_group_order_and_needs_chem_ids() {
        let normalized = vec![
            point("P2", "4", 1e-7, 0.1),
            point("P2", "4", 1e-6, -0.1),
            point("P1", "3", 1e-7, 0.3),
            point("P1", "3", 1e-6, 0.2),
        ];
        let mut chem_ids = HashMap::new();
        chem_ids.insert(PlateRowKey::new("P2", "4"), "O-50".to_string());
        chem_ids.insert(PlateRowKey::new("P1", "3"), "O-44".to_string());

        let fits = fit_all(FitAlgorithm::Lowess, &normalized, &chem_ids).unwrap();
        assert_eq!(fits.len(), 2);
        assert_eq!(fits[0].chem_id, "O-50");
        assert_eq!(fits[1].key, PlateRowKey::new("P1", "3"));

        chem_ids.remove(&PlateRowKey::new("P1", "3"));
        let err = fit_all(FitAlgorithm::Lowess, &normalized, &chem_ids).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn fit_needs_two_distinct_concentrations() {
        let err = fit(FitAlgorithm::Lowess, &[1e-6, 1e-6, 1e-6], &[1.0, 2.0, 3.0], 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.message().contains("found 1"));
        let err = fit(FitAlgorithm::Lowess, &[], &[], 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(fit(FitAlgorithm::Lowess, &[1e-6, 1e-5], &[1.0, 2.0], 1.0).is_ok());
    }

    #[test]
    fn fit_rejects_bad_input_before_smoothing() {
        for bad in [0.0, -0.5, 1.5, f64::NAN] {
            let err = fit(FitAlgorithm::Lowess, &[1.0, 2.0], &[1.0, 2.0], bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        let err = fit(FitAlgorithm::Lowess, &[1.0, 2.0], &[1.0], 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        let err = fit(FitAlgorithm::Lowess, &[1.0, 2.0], &[1.0, f64::INFINITY], 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
