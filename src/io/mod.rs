//! Input/output helpers.
//!
//! - CSV ingest of the joined measurement table (`ingest`)
//! - cleaned/normalized table and QC report exports (`export`)
//! - per-group fit artifacts, JSON plus SVG (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
