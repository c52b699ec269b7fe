//! Summary statistics shared by QC and normalization.

pub mod stats;

pub use stats::*;
