//! CSV ingest of the joined measurement table.
//!
//! Turns a plate-reader export (already merged with its plate layout) into a
//! `MeasurementTable`.
//!
//! - **Strict schema**: `Plate_ID`, `row`, `chem_ID`, `chem_M` and `value` are
//!   required; `col` and `well` are optional; any further column is carried
//!   through verbatim.
//! - **Fail loudly**: a malformed row aborts the load with its line number.
//!   Short or long records and compound ids without a concentration are
//!   malformed; reading them as controls would shift the control statistics.
//! - Header matching is case-insensitive and ignores a UTF-8 BOM.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::debug;

use crate::domain::{
    COL_CHEM_ID, COL_CHEM_M, COL_COL, COL_PLATE, COL_ROW, COL_VALUE, COL_WELL, Measurement, MeasurementTable,
};
use crate::error::AppError;

/// Cell contents treated as a missing value.
pub const MISSING_MARKERS: [&str; 3] = ["", "NA", "NaN"];

const REQUIRED_COLUMNS: [&str; 5] = [COL_PLATE, COL_ROW, COL_CHEM_ID, COL_CHEM_M, COL_VALUE];
const KNOWN_COLUMNS: [&str; 7] = [COL_PLATE, COL_ROW, COL_COL, COL_WELL, COL_CHEM_ID, COL_CHEM_M, COL_VALUE];

/// Load a measurement table from a CSV file.
pub fn read_measurements(path: &Path) -> Result<MeasurementTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let table = parse_measurements(file, &path.display().to_string())?;
    debug!("Read {} rows from '{}'", table.len(), path.display());
    Ok(table)
}

/// Parse a measurement table from any CSV source. `source` names it in errors.
pub fn parse_measurements<R: Read>(input: R, source: &str) -> Result<MeasurementTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read CSV headers of '{source}': {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map, source)?;

    let columns = output_columns(&headers);
    let extra_columns: Vec<(usize, String)> = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !KNOWN_COLUMNS.contains(&name.as_str()))
        .map(|(idx, name)| (idx, name.clone()))
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Data starts on line 2 (line 1 is the header).
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::invalid_data(format!("'{source}' line {line}: CSV parse error: {e}")))?;
        if record.len() != headers.len() {
            return Err(AppError::invalid_data(format!(
                "'{source}' line {line}: expected {} fields, found {}",
                headers.len(),
                record.len()
            )));
        }

        let m = parse_row(&record, &header_map, &extra_columns)
            .map_err(|msg| AppError::invalid_data(format!("'{source}' line {line}: {msg}")))?;
        rows.push(m);
    }

    if rows.is_empty() {
        return Err(AppError::empty_input(format!("'{source}' has no data rows.")));
    }

    Ok(MeasurementTable::with_columns(columns, rows))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Header names as written back out: known columns in their canonical
/// spelling, anything else verbatim.
fn output_columns(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|name| {
            let normalized = normalize_header_name(name);
            KNOWN_COLUMNS
                .iter()
                .find(|known| known.to_ascii_lowercase() == normalized)
                .map(|known| known.to_string())
                .unwrap_or_else(|| name.trim().trim_start_matches('\u{feff}').to_string())
        })
        .collect()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>, source: &str) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(&c.to_ascii_lowercase()))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::invalid_data(format!(
            "'{source}' is missing required column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    extra_columns: &[(usize, String)],
) -> Result<Measurement, String> {
    let plate_id = get_required(record, header_map, COL_PLATE)?.to_string();
    let row = get_required(record, header_map, COL_ROW)?.to_string();
    let chem_m_cell = get_optional(record, header_map, COL_CHEM_M);
    let value_cell = get_optional(record, header_map, COL_VALUE);
    let chem_concentration = parse_concentration(chem_m_cell)?;
    let value = parse_opt_f64(value_cell, COL_VALUE)?;
    let chem_id = get_optional(record, header_map, COL_CHEM_ID).map(str::to_string);
    if let (Some(id), None) = (&chem_id, chem_concentration) {
        return Err(format!("`{COL_CHEM_ID}` '{id}' has no `{COL_CHEM_M}` concentration"));
    }

    let extras = extra_columns
        .iter()
        .filter_map(|(idx, name)| {
            let cell = record.get(*idx).map(str::trim)?;
            (!is_missing(cell)).then(|| (name.clone(), cell.to_string()))
        })
        .collect();

    let source_text = [(COL_CHEM_M, chem_m_cell), (COL_VALUE, value_cell)]
        .into_iter()
        .filter_map(|(name, cell)| Some((name.to_string(), cell?.to_string())))
        .collect();

    Ok(Measurement {
        plate_id,
        row,
        col: get_optional(record, header_map, COL_COL).map(str::to_string),
        well: get_optional(record, header_map, COL_WELL).map(str::to_string),
        chem_id,
        chem_concentration,
        value,
        extras,
        source_text,
    })
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

fn get_required<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(&name.to_ascii_lowercase())?;
    record.get(*idx).map(str::trim).filter(|s| !is_missing(s))
}

/// A missing concentration marks a negative control; a present one must be a
/// positive, finite molarity.
fn parse_concentration(s: Option<&str>) -> Result<Option<f64>, String> {
    let Some(v) = parse_opt_f64(s, COL_CHEM_M)? else {
        return Ok(None);
    };
    if !(v.is_finite() && v > 0.0) {
        return Err(format!("`{COL_CHEM_M}` must be a positive concentration, got {v}"));
    }
    Ok(Some(v))
}

fn parse_opt_f64(s: Option<&str>, name: &str) -> Result<Option<f64>, String> {
    let Some(s) = s else { return Ok(None) };
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid number in `{name}`: '{s}'"))?;
    if !v.is_finite() {
        return Err(format!("Non-finite number in `{name}`: '{s}'"));
    }
    Ok(Some(v))
}
