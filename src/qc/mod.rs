//! Quality control: per-plate outlier detection and removal.
//!
//! Responsibilities:
//!
//! - compute bounds from each plate's negative controls
//! - record the outlier fraction and flagged wells (`QcRecord`)
//! - drop out-of-bound controls to produce the cleaned table
//!
//! Each plate is an independent assay run with its own baseline, so plates are
//! processed independently (in parallel) and never share statistics.

pub mod outlier;

pub use outlier::*;

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{validate_std_cutoff, MeasurementTable, QcRecord};
use crate::error::AppError;

/// QC output for a single plate.
#[derive(Debug, Clone)]
pub struct PlateQc {
    pub record: QcRecord,
    pub cleaned: MeasurementTable,
}

/// QC output for a whole run.
#[derive(Debug, Clone)]
pub struct QcOutput {
    /// One record per plate, in plate first-appearance order.
    pub records: Vec<QcRecord>,
    /// All plates' cleaned rows, concatenated in the same order.
    pub cleaned: MeasurementTable,
}

/// Run QC on one plate's rows.
pub fn qc_plate(plate: &MeasurementTable, plate_id: &str, std_cutoff: f64) -> Result<PlateQc, AppError> {
    let values = control_values(plate);
    let bounds = compute_bounds(&values, std_cutoff).map_err(|e| {
        AppError::new(e.kind(), format!("Plate '{plate_id}': {}", e.message()))
    })?;

    let classification = classify_outliers(plate_id, plate.controls(), &bounds)?;
    if classification.missing_values > 0 {
        warn!(
            "Plate '{plate_id}': {} negative control(s) have no value and were left out of the outlier statistics",
            classification.missing_values
        );
    }

    let cleaned = remove_outliers(plate, &bounds);
    let record = QcRecord {
        plate_id: plate_id.to_string(),
        bounds,
        n_controls: classification.n_controls,
        n_outliers: classification.n_outliers,
        missing_values: classification.missing_values,
        outliers: classification.flagged,
    };

    info!(
        "Plate '{plate_id}': {}/{} negative controls outside [{:.3}, {:.3}] ({:.2}%)",
        record.n_outliers,
        record.n_controls,
        record.bounds.lower,
        record.bounds.upper,
        record.outlier_fraction() * 100.0
    );

    Ok(PlateQc { record, cleaned })
}

/// Run QC on every plate of `table`.
///
/// The first failing plate aborts the run.
pub fn run_qc(table: &MeasurementTable, std_cutoff: f64) -> Result<QcOutput, AppError> {
    validate_std_cutoff(std_cutoff)?;
    if table.is_empty() {
        return Err(AppError::empty_input("The input table has no rows."));
    }

    let plate_ids = table.plate_ids();
    let plates: Vec<PlateQc> = plate_ids
        .par_iter()
        .map(|id| qc_plate(&table.plate(id), id, std_cutoff))
        .collect::<Result<_, _>>()?;

    let mut records = Vec::with_capacity(plates.len());
    let mut cleaned_parts = Vec::with_capacity(plates.len());
    for plate in plates {
        records.push(plate.record);
        cleaned_parts.push(plate.cleaned);
    }

    Ok(QcOutput {
        records,
        cleaned: MeasurementTable::concat(table.columns().to_vec(), cleaned_parts),
    })
}
