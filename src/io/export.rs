//! Table and report exports.
//!
//! Tables are written without an index column and with `NA` for missing
//! cells, so they load straight back through `ingest`.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::{
    COL_CHEM_ID, COL_CHEM_M, COL_PLATE, COL_ROW, COL_VALUE, MeasurementTable, NA, NormalizedMeasurement,
};
use crate::error::AppError;
use crate::report::QcReport;

/// Column of the normalized response in `dataNorm.csv`.
pub const COL_VALUE_NORM: &str = "valueNorm";

/// Write a measurement table with its original column layout.
pub fn write_table_csv(path: &Path, table: &MeasurementTable) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    let write_err = |e: csv::Error| AppError::io(format!("Failed to write CSV '{}': {e}", path.display()));

    writer.write_record(table.columns()).map_err(write_err)?;
    for m in table.rows() {
        let cells: Vec<String> = table
            .columns()
            .iter()
            .map(|c| m.field(c).unwrap_or_else(|| NA.to_string()))
            .collect();
        writer.write_record(&cells).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush CSV '{}': {e}", path.display())))?;

    debug!("Wrote {} rows to '{}'", table.len(), path.display());
    Ok(())
}

/// Write the normalized table: `Plate_ID,row,chem_ID,chem_M,value,valueNorm`.
pub fn write_normalized_csv(path: &Path, normalized: &[NormalizedMeasurement]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    let write_err = |e: csv::Error| AppError::io(format!("Failed to write CSV '{}': {e}", path.display()));

    writer
        .write_record([COL_PLATE, COL_ROW, COL_CHEM_ID, COL_CHEM_M, COL_VALUE, COL_VALUE_NORM])
        .map_err(write_err)?;
    for n in normalized {
        writer
            .write_record([
                n.key.plate_id.clone(),
                n.key.row.clone(),
                n.chem_id.clone().unwrap_or_else(|| NA.to_string()),
                n.chem_concentration.to_string(),
                n.value.to_string(),
                n.value_norm.to_string(),
            ])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush CSV '{}': {e}", path.display())))?;

    debug!("Wrote {} normalized rows to '{}'", normalized.len(), path.display());
    Ok(())
}

/// Write the QC report text to `path` and its HTML rendering next to it.
///
/// Returns the HTML path (`path` with an `.html` extension).
pub fn write_qc_report(path: &Path, report: &QcReport) -> Result<PathBuf, AppError> {
    let html_path = html_path_for(path);
    write_text(path, &report.text)?;
    write_text(&html_path, &report.html)?;
    debug!("Wrote QC report to '{}' and '{}'", path.display(), html_path.display());
    Ok(html_path)
}

pub fn html_path_for(path: &Path) -> PathBuf {
    path.with_extension("html")
}

/// Create `dir` (and parents) if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::io(format!("Failed to create directory '{}': {e}", dir.display())))
}

fn write_text(path: &Path, text: &str) -> Result<(), AppError> {
    fs::write(path, text).map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))
}

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create CSV '{}': {e}", path.display())))
}
