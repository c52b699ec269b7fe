//! The tabular data model: one `Measurement` per well reading.
//!
//! A `MeasurementTable` is loaded once and then treated as read-only. Every
//! pipeline stage returns a fresh table (or a derived structure) instead of
//! mutating its input, so stages can be re-run and tested in isolation.

use std::collections::{HashMap, HashSet};

use crate::domain::PlateRowKey;

/// Input/output column names (the external contract).
pub const COL_PLATE: &str = "Plate_ID";
pub const COL_ROW: &str = "row";
pub const COL_COL: &str = "col";
pub const COL_WELL: &str = "well";
pub const COL_CHEM_ID: &str = "chem_ID";
pub const COL_CHEM_M: &str = "chem_M";
pub const COL_VALUE: &str = "value";

/// Marker written for missing values.
pub const NA: &str = "NA";

/// Column order used for tables that were not read from a file.
pub const CANONICAL_COLUMNS: [&str; 7] = [
    COL_PLATE,
    COL_ROW,
    COL_COL,
    COL_WELL,
    COL_CHEM_ID,
    COL_CHEM_M,
    COL_VALUE,
];

/// One well reading merged with its experimental setup.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub plate_id: String,
    /// Replicate-well group within the plate.
    pub row: String,
    pub col: Option<String>,
    pub well: Option<String>,
    /// Compound identifier; usually empty for negative controls.
    pub chem_id: Option<String>,
    /// Molar concentration. `None` marks a negative control.
    pub chem_concentration: Option<f64>,
    /// Raw luciferase signal. `None` only when the input cell was missing.
    pub value: Option<f64>,
    /// Any further input columns, carried through verbatim.
    pub extras: HashMap<String, String>,
    /// Input spelling of the `chem_M` and `value` cells. Exports write it back
    /// instead of re-formatting the parsed number.
    pub source_text: HashMap<String, String>,
}

impl Measurement {
    /// A drug well.
    pub fn drug(plate_id: &str, row: &str, chem_id: &str, concentration: f64, value: f64) -> Self {
        Self {
            plate_id: plate_id.to_string(),
            row: row.to_string(),
            col: None,
            well: None,
            chem_id: Some(chem_id.to_string()),
            chem_concentration: Some(concentration),
            value: Some(value),
            extras: HashMap::new(),
            source_text: HashMap::new(),
        }
    }

    /// A negative-control well.
    pub fn control(plate_id: &str, row: &str, value: f64) -> Self {
        Self {
            plate_id: plate_id.to_string(),
            row: row.to_string(),
            col: None,
            well: None,
            chem_id: None,
            chem_concentration: None,
            value: Some(value),
            extras: HashMap::new(),
            source_text: HashMap::new(),
        }
    }

    pub fn with_well(mut self, well: &str) -> Self {
        self.well = Some(well.to_string());
        self
    }

    pub fn is_control(&self) -> bool {
        self.chem_concentration.is_none()
    }

    pub fn is_drug(&self) -> bool {
        self.chem_concentration.is_some()
    }

    pub fn key(&self) -> PlateRowKey {
        PlateRowKey::new(&self.plate_id, &self.row)
    }

    /// Render a column for export; `None` means the cell is missing.
    pub fn field(&self, column: &str) -> Option<String> {
        match column {
            COL_PLATE => Some(self.plate_id.clone()),
            COL_ROW => Some(self.row.clone()),
            COL_COL => self.col.clone(),
            COL_WELL => self.well.clone(),
            COL_CHEM_ID => self.chem_id.clone(),
            COL_CHEM_M => self.chem_concentration.map(|v| self.number_text(COL_CHEM_M, v)),
            COL_VALUE => self.value.map(|v| self.number_text(COL_VALUE, v)),
            other => self.extras.get(other).cloned(),
        }
    }

    fn number_text(&self, column: &str, v: f64) -> String {
        self.source_text.get(column).cloned().unwrap_or_else(|| v.to_string())
    }
}

/// Ordered rows plus the ordered column list they were read with.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTable {
    columns: Vec<String>,
    rows: Vec<Measurement>,
}

impl MeasurementTable {
    /// Build a table with the canonical column order.
    pub fn new(rows: Vec<Measurement>) -> Self {
        Self {
            columns: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn with_columns(columns: Vec<String>, rows: Vec<Measurement>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Measurement] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn drugs(&self) -> impl Iterator<Item = &Measurement> {
        self.rows.iter().filter(|m| m.is_drug())
    }

    pub fn controls(&self) -> impl Iterator<Item = &Measurement> {
        self.rows.iter().filter(|m| m.is_control())
    }

    /// Plate ids in order of first appearance.
    pub fn plate_ids(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for m in &self.rows {
            if seen.insert(m.plate_id.as_str()) {
                out.push(m.plate_id.clone());
            }
        }
        out
    }

    /// Sub-table holding only the rows of one plate.
    pub fn plate(&self, plate_id: &str) -> MeasurementTable {
        self.filter(|m| m.plate_id == plate_id)
    }

    pub fn filter(&self, keep: impl Fn(&Measurement) -> bool) -> MeasurementTable {
        MeasurementTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|m| keep(m)).cloned().collect(),
        }
    }

    /// `(plate_id, row)` groups that contain drug rows, in order of first appearance.
    pub fn drug_groups(&self) -> Vec<PlateRowKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for m in self.drugs() {
            let key = m.key();
            if seen.insert(key.clone()) {
                out.push(key);
            }
        }
        out
    }

    /// Concatenate tables that share a column layout.
    pub fn concat(columns: Vec<String>, tables: impl IntoIterator<Item = MeasurementTable>) -> MeasurementTable {
        let rows = tables.into_iter().flat_map(|t| t.rows).collect();
        MeasurementTable { columns, rows }
    }
}
