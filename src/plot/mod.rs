//! Chart rendering for fitted groups.

pub mod chart;

pub use chart::*;
