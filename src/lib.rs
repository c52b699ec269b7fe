//! `dose-curves` library crate.
//!
//! The binary (`dose`) is a thin wrapper around this library so that:
//!
//! - the QC, normalization and fitting stages are testable without spawning processes
//! - each stage can be reused on an in-memory `MeasurementTable`

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod normalize;
pub mod plot;
pub mod qc;
pub mod report;
