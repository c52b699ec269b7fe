//! Report assembly: QC reports and per-group fit reports.
//!
//! QC sections are joined in plate order. Fit results are joined back with
//! the normalized scatter they were fitted from, keyed by `(plate_id, row)`.

pub mod format;

pub use format::*;

use std::collections::HashMap;

use crate::domain::{FitResult, MeasurementTable, NormalizedMeasurement, PlateRowKey, QcRecord};
use crate::error::AppError;
use crate::fit::group_normalized;

/// The assembled QC report in both output formats.
#[derive(Debug, Clone, PartialEq)]
pub struct QcReport {
    pub text: String,
    pub html: String,
}

/// Join every plate's QC section: blank lines between text sections, `<hr>`
/// between HTML sections.
pub fn assemble_qc_report(records: &[QcRecord], columns: &[String]) -> Result<QcReport, AppError> {
    let text = records
        .iter()
        .map(|r| format_qc_section_text(r, columns))
        .collect::<Result<Vec<_>, _>>()?
        .join("\n\n");
    let html = records
        .iter()
        .map(|r| format_qc_section_html(r, columns))
        .collect::<Vec<_>>()
        .join("<hr>");
    Ok(QcReport { text, html })
}

/// Compound identifier of each drug group: the first drug row's `chem_ID`.
pub fn chem_ids_by_group(table: &MeasurementTable) -> Result<HashMap<PlateRowKey, String>, AppError> {
    let mut out = HashMap::new();
    for m in table.drugs() {
        if let Some(id) = &m.chem_id {
            out.entry(m.key()).or_insert_with(|| id.clone());
        }
    }
    for key in table.drug_groups() {
        if !out.contains_key(&key) {
            return Err(AppError::invalid_data(format!("{key} has drug wells but no chem_ID")));
        }
    }
    Ok(out)
}

/// A fitted group together with the normalized points it was fitted from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub fit: FitResult,
    /// `(chem_concentration, value_norm)` in input order.
    pub points: Vec<(f64, f64)>,
}

impl GroupReport {
    /// File stem shared by the group's artifacts:
    /// `{chem_id}_{plate_id}_{row}_{model}`.
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            path_safe(&self.fit.chem_id),
            path_safe(&self.fit.key.plate_id),
            path_safe(&self.fit.key.row),
            self.fit.model.name()
        )
    }
}

/// Pair every fit with its scatter points. A fit whose group has no
/// normalized points is an empty group.
pub fn assemble_fit_reports(
    fits: Vec<FitResult>,
    normalized: &[NormalizedMeasurement],
) -> Result<Vec<GroupReport>, AppError> {
    let mut scatter: HashMap<PlateRowKey, Vec<(f64, f64)>> = group_normalized(normalized)
        .into_iter()
        .map(|(key, points)| {
            let xy = points.iter().map(|p| (p.chem_concentration, p.value_norm)).collect();
            (key, xy)
        })
        .collect();

    fits.into_iter()
        .map(|fit| {
            let points = scatter
                .remove(&fit.key)
                .ok_or_else(|| AppError::empty_group(format!("{} has a fit but no normalized data", fit.key)))?;
            Ok(GroupReport { fit, points })
        })
        .collect()
}

fn path_safe(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') || c.is_whitespace() { '-' } else { c })
        .collect()
}
