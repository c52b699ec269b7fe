//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - LOWESS smoothing of concentration/response pairs (the `lowess` crate)
//! - the model registry (`FitAlgorithm` → `CurveModel`)
//! - paired production/reference fits per compound group (parallel)

pub mod fitter;
pub mod registry;
pub mod smoother;

pub use fitter::*;
pub use registry::*;
pub use smoother::*;
