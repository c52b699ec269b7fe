//! In-memory pipeline stages shared by the `qc`, `fit` and `run` commands.
//!
//! Stages take a loaded table and return everything the caller needs to write
//! out, so the file handling in `app` stays a thin layer:
//! QC (per plate) -> cleaned table + report -> normalization -> fits -> group reports.

use log::info;

use crate::domain::{MeasurementTable, NormalizedMeasurement, PipelineConfig};
use crate::error::AppError;
use crate::fit::fit_all;
use crate::normalize::preprocess;
use crate::qc::{QcOutput, run_qc};
use crate::report::{GroupReport, QcReport, assemble_fit_reports, assemble_qc_report, chem_ids_by_group};

/// File names used inside an output directory.
pub const QC_REPORT_FILE: &str = "qc_report.csv";
pub const CLEANED_FILE: &str = "cleaned.csv";
pub const NORMALIZED_FILE: &str = "dataNorm.csv";

/// Outputs of the QC stage.
#[derive(Debug, Clone)]
pub struct QcStage {
    pub qc: QcOutput,
    pub report: QcReport,
}

/// Outputs of the normalization + fitting stage.
#[derive(Debug, Clone)]
pub struct FitStage {
    pub normalized: Vec<NormalizedMeasurement>,
    pub reports: Vec<GroupReport>,
}

/// Outlier QC over every plate plus the assembled report.
pub fn run_qc_stage(table: &MeasurementTable, config: &PipelineConfig) -> Result<QcStage, AppError> {
    let qc = run_qc(table, config.std_cutoff)?;
    let report = assemble_qc_report(&qc.records, table.columns())?;

    let removed = table.len() - qc.cleaned.len();
    info!(
        "QC: {} plate(s), {removed} outlier control(s) removed, {} row(s) kept",
        qc.records.len(),
        qc.cleaned.len()
    );

    Ok(QcStage { qc, report })
}

/// Normalize a (cleaned) table and fit every compound group.
pub fn run_fit_stage(table: &MeasurementTable, config: &PipelineConfig) -> Result<FitStage, AppError> {
    let normalized = preprocess(table)?;
    info!("Normalization: {} concentration point(s)", normalized.len());

    let chem_ids = chem_ids_by_group(table)?;
    let fits = fit_all(config.model, &normalized, &chem_ids)?;
    let reports = assemble_fit_reports(fits, &normalized)?;
    info!("Fitting: {} group(s) fitted with {}", reports.len(), config.model);

    Ok(FitStage { normalized, reports })
}
