//! Formatted output: QC report sections (text + HTML) and the terminal summary.
//!
//! Formatting lives in one place so the QC and fitting code stays free of
//! presentation concerns and output changes stay localized.

use crate::domain::{NA, PipelineConfig, QcRecord};
use crate::error::AppError;
use crate::fit::{PRODUCTION_LOCALITY, REFERENCE_LOCALITY};
use crate::report::GroupReport;

const OUTLIER_HEADING: &str = "Percentage of outliers in the negative controls";
const OUTLIER_WELLS: &str = "The wells containing the outliers:";

/// One plate's QC section as delimited text.
///
/// Layout: plate id, the outlier percentage line, then the flagged control
/// rows as CSV (header always present, `NA` for missing cells), separated by
/// blank lines.
pub fn format_qc_section_text(record: &QcRecord, columns: &[String]) -> Result<String, AppError> {
    let mut out = String::new();
    out.push_str(&record.plate_id);
    out.push_str("\n\n");
    out.push_str(&format!("{OUTLIER_HEADING}: {}", fmt_percent(record)));
    out.push_str("\n\n");
    out.push_str(OUTLIER_WELLS);
    out.push('\n');
    out.push_str(&outliers_csv(record, columns)?);
    Ok(out)
}

/// One plate's QC section as an HTML fragment.
pub fn format_qc_section_html(record: &QcRecord, columns: &[String]) -> String {
    let parts = [
        format!("<p>{}</p>", escape_html(&record.plate_id)),
        format!("<p>{OUTLIER_HEADING}: {}</p>", fmt_percent(record)),
        format!("<b>{OUTLIER_WELLS}</b>"),
        outliers_html_table(record, columns),
    ];
    parts.join("<br>\n")
}

/// Terminal summary of a run: QC per plate, then fitted groups.
pub fn format_run_summary(records: &[QcRecord], reports: &[GroupReport], config: &PipelineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dose - Dose-Response Curve Pipeline ===\n");
    out.push_str(&format!("Model: {}\n", config.model.display_name()));
    out.push_str(&format!("Outlier cutoff: mean +/- {:.2} std\n", config.std_cutoff));

    if !records.is_empty() {
        out.push_str("\nNegative-control QC:\n");
        push_line(
            &mut out,
            format!(
                "{:<16} {:>10} {:>10} {:>9} {:>8} {:>12} {:>12}",
                "plate", "controls", "outliers", "pct", "missing", "lower", "upper"
            ),
        );
        push_line(
            &mut out,
            format!(
                "{:-<16} {:-<10} {:-<10} {:-<9} {:-<8} {:-<12} {:-<12}",
                "", "", "", "", "", "", ""
            ),
        );
        for r in records {
            push_line(
                &mut out,
                format!(
                    "{:<16} {:>10} {:>10} {:>9} {:>8} {:>12.3} {:>12.3}",
                    truncate(&r.plate_id, 16),
                    r.n_controls,
                    r.n_outliers,
                    fmt_percent(r),
                    r.missing_values,
                    r.bounds.lower,
                    r.bounds.upper,
                ),
            );
        }
    }

    if !reports.is_empty() {
        out.push_str(&format!(
            "\nFitted groups: n={} (production frac={:.3}, reference frac={:.3})\n",
            reports.len(),
            PRODUCTION_LOCALITY,
            REFERENCE_LOCALITY
        ));
        push_line(
            &mut out,
            format!("{:<16} {:<16} {:<8} {:>7}  {}", "chem_ID", "plate", "row", "points", "artifact"),
        );
        push_line(
            &mut out,
            format!("{:-<16} {:-<16} {:-<8} {:-<7}  {:-<8}", "", "", "", "", ""),
        );
        for g in reports {
            push_line(
                &mut out,
                format!(
                    "{:<16} {:<16} {:<8} {:>7}  {}",
                    truncate(&g.fit.chem_id, 16),
                    truncate(&g.fit.key.plate_id, 16),
                    truncate(&g.fit.key.row, 8),
                    g.points.len(),
                    g.artifact_stem()
                ),
            );
        }
    }

    out
}

fn outliers_csv(record: &QcRecord, columns: &[String]) -> Result<String, AppError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    let to_err = |e: csv::Error| AppError::io(format!("Failed to format QC outliers for plate '{}': {e}", record.plate_id));

    writer.write_record(columns).map_err(to_err)?;
    for m in &record.outliers {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| m.field(c).unwrap_or_else(|| NA.to_string()))
            .collect();
        writer.write_record(&cells).map_err(to_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::io(format!("Failed to format QC outliers for plate '{}': {e}", record.plate_id)))?;
    String::from_utf8(bytes).map_err(|e| AppError::invalid_data(format!("Non UTF-8 cell in plate '{}': {e}", record.plate_id)))
}

fn outliers_html_table(record: &QcRecord, columns: &[String]) -> String {
    let mut out = String::from("<table>\n<thead>\n<tr>");
    for c in columns {
        out.push_str(&format!("<th>{}</th>", escape_html(c)));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");
    for m in &record.outliers {
        out.push_str("<tr>");
        for c in columns {
            let cell = m.field(c).unwrap_or_else(|| NA.to_string());
            out.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>");
    out
}

fn fmt_percent(record: &QcRecord) -> String {
    format!("{:.2}%", record.outlier_fraction() * 100.0)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
