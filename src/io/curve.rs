//! Per-group fit artifacts.
//!
//! Every fitted group gets two files sharing the stem
//! `{chem_id}_{plate_id}_{row}_{model}`:
//!
//! - `{stem}.json`: scatter, production and reference curves plus run metadata
//! - `{stem}.svg`: the rendered chart
//!
//! The JSON schema is [`FitArtifact`].

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{Curve, FitAlgorithm, PlateRowKey};
use crate::error::AppError;
use crate::fit::{PRODUCTION_LOCALITY, REFERENCE_LOCALITY};
use crate::plot::render_fit_chart;
use crate::report::GroupReport;

/// Portable record of one group's fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitArtifact {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub key: PlateRowKey,
    pub chem_id: String,
    pub model: FitAlgorithm,
    pub production_locality: f64,
    pub reference_locality: f64,
    /// Normalized replicate means the curves were fitted to.
    pub scatter: Curve,
    pub production: Curve,
    pub reference: Curve,
}

impl FitArtifact {
    pub fn from_report(report: &GroupReport) -> Self {
        let (x, y) = report.points.iter().copied().unzip();
        Self {
            tool: "dose".to_string(),
            generated_at: Utc::now(),
            key: report.fit.key.clone(),
            chem_id: report.fit.chem_id.clone(),
            model: report.fit.model,
            production_locality: PRODUCTION_LOCALITY,
            reference_locality: REFERENCE_LOCALITY,
            scatter: Curve { x, y },
            production: report.fit.production.clone(),
            reference: report.fit.reference.clone(),
        }
    }
}

/// Paths written for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub json: PathBuf,
    pub svg: PathBuf,
}

/// Write a fit artifact JSON file.
pub fn write_fit_json(path: &Path, artifact: &FitArtifact) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, artifact)
        .map_err(|e| AppError::io(format!("Failed to write fit JSON '{}': {e}", path.display())))
}

/// Read a fit artifact JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitArtifact, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::invalid_data(format!("Invalid fit JSON '{}': {e}", path.display())))
}

/// Write the JSON and SVG artifacts of one group into `dir`.
pub fn write_group_artifacts(dir: &Path, report: &GroupReport) -> Result<ArtifactPaths, AppError> {
    let stem = report.artifact_stem();
    let paths = ArtifactPaths {
        json: dir.join(format!("{stem}.json")),
        svg: dir.join(format!("{stem}.svg")),
    };

    write_fit_json(&paths.json, &FitArtifact::from_report(report))?;
    render_fit_chart(&paths.svg, report)?;

    debug!("Wrote artifacts for {} to '{}'", report.fit.key, dir.display());
    Ok(paths)
}

/// Write artifacts for every group. Groups are rendered in parallel; the
/// returned paths keep the input order.
pub fn write_all_artifacts(dir: &Path, reports: &[GroupReport]) -> Result<Vec<ArtifactPaths>, AppError> {
    reports
        .par_iter()
        .map(|r| write_group_artifacts(dir, r))
        .collect()
}
