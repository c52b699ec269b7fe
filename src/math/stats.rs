//! Summary statistics used by QC and normalization.
//!
//! The assay pipeline is mean-based throughout. Standard deviations are
//! population statistics (divide by `n`), computed over exactly the values
//! handed in.

use nalgebra::DVector;

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(DVector::from_column_slice(values).mean())
}

/// Population standard deviation, or `None` for an empty slice.
///
/// Two-pass form: the mean is subtracted before squaring, which keeps large
/// luciferase intensities from cancelling catastrophically.
pub fn population_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = DVector::from_column_slice(values);
    let centered = v.add_scalar(-v.mean());
    Some((centered.norm_squared() / values.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_population_std() {
        let v = [10.0, 10.0, 10.0, 100.0];
        assert!((mean(&v).unwrap() - 32.5).abs() < 1e-12);
        // sqrt(6075 / 4)
        assert!((population_std(&v).unwrap() - 38.971_143_170_299_74).abs() < 1e-9);
    }

    #[test]
    fn large_intensities_keep_their_spread() {
        let v = [1e9 + 1.0, 1e9 - 1.0, 1e9 + 1.0, 1e9 - 1.0];
        assert!((population_std(&v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_have_no_statistics() {
        assert!(mean(&[]).is_none());
        assert!(population_std(&[]).is_none());
    }
}
