//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the measurement table every component reads (`Measurement`, `MeasurementTable`)
//! - composite keys and derived entities (`PlateRowKey`, `ControlMeans`, `FitResult`, ...)
//! - the validated run configuration (`PipelineConfig`)

pub mod table;
pub mod types;

pub use table::*;
pub use types::*;
