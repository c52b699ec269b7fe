//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during QC, normalization and fitting
//! - exported to CSV/JSON
//! - joined back together by the report layer

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default outlier bound multiplier.
pub const DEFAULT_STD_CUTOFF: f64 = 3.0;

/// Default curve-fit algorithm name.
pub const DEFAULT_MODEL_NAME: &str = "LOWESS";

/// Composite `(plate_id, row)` key: one compound's replicate group on one plate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlateRowKey {
    pub plate_id: String,
    pub row: String,
}

impl PlateRowKey {
    pub fn new(plate_id: &str, row: &str) -> Self {
        Self {
            plate_id: plate_id.to_string(),
            row: row.to_string(),
        }
    }
}

impl fmt::Display for PlateRowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plate '{}', row '{}'", self.plate_id, self.row)
    }
}

/// Plate-local outlier bounds derived from negative controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub upper: f64,
    pub lower: f64,
}

impl OutlierBounds {
    /// Strictly outside `[lower, upper]`.
    pub fn is_outlier(&self, value: f64) -> bool {
        value > self.upper || value < self.lower
    }
}

/// Per-plate quality-control statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct QcRecord {
    pub plate_id: String,
    pub bounds: OutlierBounds,
    /// Controls with a usable value (the outlier-fraction denominator).
    pub n_controls: usize,
    pub n_outliers: usize,
    /// Controls whose `value` cell was missing; excluded from the statistics.
    pub missing_values: usize,
    /// The flagged control rows, in input order.
    pub outliers: Vec<crate::domain::Measurement>,
}

impl QcRecord {
    /// Fraction of controls outside the bounds, in `[0, 1]`.
    pub fn outlier_fraction(&self) -> f64 {
        self.n_outliers as f64 / self.n_controls as f64
    }
}

/// Two-level control reference: row means and plate means of those row means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlMeans {
    pub rows: HashMap<PlateRowKey, f64>,
    pub plates: HashMap<String, f64>,
}

impl ControlMeans {
    pub fn row_mean(&self, key: &PlateRowKey) -> Option<f64> {
        self.rows.get(key).copied()
    }

    pub fn plate_mean(&self, plate_id: &str) -> Option<f64> {
        self.plates.get(plate_id).copied()
    }
}

/// Replicate-averaged drug reading for one `(plate_id, row, chem_concentration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrugMean {
    pub key: PlateRowKey,
    pub chem_id: Option<String>,
    pub chem_concentration: f64,
    pub value: f64,
    pub replicates: usize,
}

/// A drug mean referenced against its row and plate controls.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMeasurement {
    pub key: PlateRowKey,
    pub chem_id: Option<String>,
    pub chem_concentration: f64,
    /// Replicate-averaged raw value.
    pub value: f64,
    /// `(value - row control mean) / plate control mean`.
    pub value_norm: f64,
}

/// An ordered fitted curve (x non-decreasing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// `(min, max)` of x, or `None` for an empty curve.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        Some((*self.x.first()?, *self.x.last()?))
    }
}

/// Registered curve-fit algorithms.
///
/// Name lookup walks [`FitAlgorithm::ALL`], so registering a new variant is
/// enough for it to be accepted by `from_name` and listed in its error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitAlgorithm {
    #[serde(rename = "LOWESS")]
    Lowess,
}

impl FitAlgorithm {
    pub const ALL: [FitAlgorithm; 1] = [FitAlgorithm::Lowess];

    /// Canonical name used in artifact file names.
    pub fn name(self) -> &'static str {
        match self {
            FitAlgorithm::Lowess => "LOWESS",
        }
    }

    /// Human-readable label for charts and terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            FitAlgorithm::Lowess => "LOWESS (locally weighted scatterplot smoothing)",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Result<Self, AppError> {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|alg| alg.name()).collect();
                AppError::unsupported_model(format!(
                    "Invalid model name ({name}); supported models: {}",
                    known.join(", ")
                ))
            })
    }
}

impl fmt::Display for FitAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Paired fit output for one compound group.
///
/// Both curves come from the same normalized snapshot and differ only in the
/// locality fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub key: PlateRowKey,
    pub chem_id: String,
    pub model: FitAlgorithm,
    /// Fit at the production locality (2/3).
    pub production: Curve,
    /// Fit at the reference locality (1.0).
    pub reference: Curve,
}

/// A run's validated parameters.
///
/// Built from CLI flags (plus environment fallbacks) and checked before any
/// file is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Outlier bound multiplier (`mean ± std_cutoff · std`).
    pub std_cutoff: f64,
    pub model: FitAlgorithm,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            std_cutoff: DEFAULT_STD_CUTOFF,
            model: FitAlgorithm::Lowess,
        }
    }
}

impl PipelineConfig {
    pub fn new(std_cutoff: f64, model_name: &str) -> Result<Self, AppError> {
        let model = FitAlgorithm::from_name(model_name)?;
        let config = Self { std_cutoff, model };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_std_cutoff(self.std_cutoff)
    }
}

pub fn validate_std_cutoff(std_cutoff: f64) -> Result<(), AppError> {
    if !(std_cutoff.is_finite() && std_cutoff > 0.0) {
        return Err(AppError::configuration(format!(
            "Invalid outlier cutoff ({std_cutoff}); it must be a positive number of standard deviations."
        )));
    }
    Ok(())
}
