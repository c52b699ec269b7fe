//! Control-based normalization (within-plate and between-plate correction).
//!
//! The scheme is a deliberate two-stage transform applied to replicate
//! averaged drug readings:
//!
//! ```text
//! centred    = drug_mean - control_mean(plate, row)     // within-plate position
//! value_norm = centred / control_mean(plate)            // between-plate batch
//! ```
//!
//! The order is fixed. Scaling first and centring second gives different
//! numbers, so the two stages are kept as separate lookups rather than folded
//! into one formula.
//!
//! `control_mean(plate)` is the mean of that plate's row-level control means,
//! not a pooled mean over its raw control wells.

use std::collections::HashMap;

use log::debug;

use crate::domain::{ControlMeans, DrugMean, MeasurementTable, NormalizedMeasurement, PlateRowKey};
use crate::error::AppError;
use crate::math::mean;

/// Average drug replicates per `(plate_id, row, chem_concentration)`.
///
/// Groups keep their first-appearance order. Missing values are ignored; a
/// group with no value at all is an error.
pub fn average_drug_replicates(table: &MeasurementTable) -> Result<Vec<DrugMean>, AppError> {
    struct Acc {
        key: PlateRowKey,
        chem_id: Option<String>,
        concentration: f64,
        values: Vec<f64>,
    }

    let mut index: HashMap<(PlateRowKey, u64), usize> = HashMap::new();
    let mut groups: Vec<Acc> = Vec::new();

    for m in table.drugs() {
        let Some(concentration) = m.chem_concentration else { continue };
        let key = m.key();
        let slot = *index
            .entry((key.clone(), concentration.to_bits()))
            .or_insert_with(|| {
                groups.push(Acc {
                    key,
                    chem_id: None,
                    concentration,
                    values: Vec::new(),
                });
                groups.len() - 1
            });
        let acc = &mut groups[slot];
        if acc.chem_id.is_none() {
            acc.chem_id = m.chem_id.clone();
        }
        if let Some(v) = m.value {
            acc.values.push(v);
        }
    }

    groups
        .into_iter()
        .map(|acc| {
            let value = mean(&acc.values).ok_or_else(|| {
                AppError::empty_input(format!(
                    "{} has no drug values at concentration {}",
                    acc.key, acc.concentration
                ))
            })?;
            Ok(DrugMean {
                key: acc.key,
                chem_id: acc.chem_id,
                chem_concentration: acc.concentration,
                value,
                replicates: acc.values.len(),
            })
        })
        .collect()
}

/// Compute row-level and plate-level control means.
///
/// Fails with an empty-group error if any drug `(plate_id, row)` has no
/// matching control mean.
pub fn compute_control_means(table: &MeasurementTable) -> Result<ControlMeans, AppError> {
    let mut row_order: Vec<PlateRowKey> = Vec::new();
    let mut row_values: HashMap<PlateRowKey, Vec<f64>> = HashMap::new();

    for m in table.controls() {
        let key = m.key();
        let values = row_values.entry(key.clone()).or_insert_with(|| {
            row_order.push(key);
            Vec::new()
        });
        if let Some(v) = m.value {
            values.push(v);
        }
    }

    let mut rows = HashMap::new();
    let mut plate_order: Vec<String> = Vec::new();
    let mut plate_row_means: HashMap<String, Vec<f64>> = HashMap::new();
    for key in row_order {
        // A control row with no values contributes no reference; drug rows
        // pointing at it are caught below.
        let Some(row_mean) = row_values.get(&key).and_then(|v| mean(v)) else { continue };
        plate_row_means
            .entry(key.plate_id.clone())
            .or_insert_with(|| {
                plate_order.push(key.plate_id.clone());
                Vec::new()
            })
            .push(row_mean);
        rows.insert(key, row_mean);
    }

    let mut plates = HashMap::new();
    for plate_id in plate_order {
        if let Some(plate_mean) = plate_row_means.get(&plate_id).and_then(|v| mean(v)) {
            plates.insert(plate_id, plate_mean);
        }
    }

    let means = ControlMeans { rows, plates };

    for key in table.drug_groups() {
        if means.row_mean(&key).is_none() {
            return Err(AppError::empty_group(format!(
                "{key} has drug wells but no negative-control values to reference"
            )));
        }
    }

    Ok(means)
}

/// Reference each drug mean against its row and plate controls.
pub fn normalize(
    drug_means: &[DrugMean],
    control_means: &ControlMeans,
) -> Result<Vec<NormalizedMeasurement>, AppError> {
    drug_means
        .iter()
        .map(|d| {
            let (row_mean, plate_mean) = reference_means(&d.key, control_means)?;

            let centred = d.value - row_mean;
            let value_norm = centred / plate_mean;
            if !value_norm.is_finite() {
                return Err(AppError::numerical(format!(
                    "{}: non-finite normalized value at concentration {}",
                    d.key, d.chem_concentration
                )));
            }

            Ok(NormalizedMeasurement {
                key: d.key.clone(),
                chem_id: d.chem_id.clone(),
                chem_concentration: d.chem_concentration,
                value: d.value,
                value_norm,
            })
        })
        .collect()
}

/// Invert [`normalize`] for one value: scale back by the plate mean, then add
/// the row mean.
pub fn denormalize(value_norm: f64, key: &PlateRowKey, control_means: &ControlMeans) -> Result<f64, AppError> {
    let (row_mean, plate_mean) = reference_means(key, control_means)?;
    Ok(value_norm * plate_mean + row_mean)
}

/// Full preprocessing pass: replicate averaging, control means, normalization.
pub fn preprocess(table: &MeasurementTable) -> Result<Vec<NormalizedMeasurement>, AppError> {
    let drug_means = average_drug_replicates(table)?;
    let control_means = compute_control_means(table)?;
    debug!(
        "Control means: {} row group(s) across {} plate(s)",
        control_means.rows.len(),
        control_means.plates.len()
    );
    normalize(&drug_means, &control_means)
}

fn reference_means(key: &PlateRowKey, control_means: &ControlMeans) -> Result<(f64, f64), AppError> {
    let row_mean = control_means.row_mean(key).ok_or_else(|| {
        AppError::empty_group(format!("{key} has no matching negative-control group"))
    })?;
    let plate_mean = control_means.plate_mean(&key.plate_id).ok_or_else(|| {
        AppError::empty_group(format!("Plate '{}' has no negative-control mean", key.plate_id))
    })?;
    if plate_mean == 0.0 {
        return Err(AppError::invalid_data(format!(
            "Plate '{}' has a negative-control mean of zero; cannot scale {key}",
            key.plate_id
        )));
    }
    Ok((row_mean, plate_mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Measurement;
    use crate::error::ErrorKind;

    fn plate() -> MeasurementTable {
        MeasurementTable::new(vec![
            // row 1: controls 10, 14 -> 12
            Measurement::control("P1", "1", 10.0),
            Measurement::control("P1", "1", 14.0),
            Measurement::drug("P1", "1", "O-1", 1e-7, 6.0),
            Measurement::drug("P1", "1", "O-1", 1e-7, 8.0),
            Measurement::drug("P1", "1", "O-1", 1e-6, 2.0),
            Measurement::drug("P1", "1", "O-1", 1e-6, 4.0),
            // row 2: controls 20, 20, 20, 20 -> 20 (four wells)
            Measurement::control("P1", "2", 20.0),
            Measurement::control("P1", "2", 20.0),
            Measurement::control("P1", "2", 20.0),
            Measurement::control("P1", "2", 20.0),
            Measurement::drug("P1", "2", "O-2", 1e-6, 36.0),
        ])
    }

    #[test]
    fn replicates_are_averaged_per_concentration() {
        let means = average_drug_replicates(&plate()).unwrap();
        assert_eq!(means.len(), 3);
        assert_eq!(means[0].chem_concentration, 1e-7);
        assert_eq!(means[0].value, 7.0);
        assert_eq!(means[0].replicates, 2);
        assert_eq!(means[1].value, 3.0);
        assert_eq!(means[2].key, PlateRowKey::new("P1", "2"));
        assert_eq!(means[2].chem_id.as_deref(), Some("O-2"));
    }

    #[test]
    fn plate_mean_is_mean_of_row_means() {
        let means = compute_control_means(&plate()).unwrap();
        assert_eq!(means.row_mean(&PlateRowKey::new("P1", "1")), Some(12.0));
        assert_eq!(means.row_mean(&PlateRowKey::new("P1", "2")), Some(20.0));
        // (12 + 20) / 2, not the pooled (10+14+20*4)/6.
        assert_eq!(means.plate_mean("P1"), Some(16.0));
    }

    #[test]
    fn normalization_centres_then_scales() {
        let out = preprocess(&plate()).unwrap();
        assert_eq!(out.len(), 3);
        assert!((out[0].value_norm - (7.0 - 12.0) / 16.0).abs() < 1e-12);
        assert!((out[1].value_norm - (3.0 - 12.0) / 16.0).abs() < 1e-12);
        assert!((out[2].value_norm - (36.0 - 20.0) / 16.0).abs() < 1e-12);

        // Scaling before centring is a different transform.
        let swapped = 7.0 / 16.0 - 12.0;
        assert!((out[0].value_norm - swapped).abs() > 1.0);
    }

    #[test]
    fn denormalize_recovers_the_drug_mean() {
        let table = plate();
        let drug_means = average_drug_replicates(&table).unwrap();
        let control_means = compute_control_means(&table).unwrap();
        let normalized = normalize(&drug_means, &control_means).unwrap();
        for (d, n) in drug_means.iter().zip(&normalized) {
            let back = denormalize(n.value_norm, &n.key, &control_means).unwrap();
            assert!((back - d.value).abs() < 1e-9);
        }
    }

    #[test]
    fn drug_group_without_controls_is_an_empty_group() {
        let mut rows = plate().rows().to_vec();
        rows.push(Measurement::drug("P1", "7", "O-7", 1e-6, 1.0));
        let err = compute_control_means(&MeasurementTable::new(rows)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyGroup);
        assert!(err.message().contains("row '7'"));
    }

    #[test]
    fn zero_plate_mean_is_rejected() {
        let table = MeasurementTable::new(vec![
            Measurement::control("P1", "1", 0.0),
            Measurement::drug("P1", "1", "O-1", 1e-6, 1.0),
        ]);
        let err = preprocess(&table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
