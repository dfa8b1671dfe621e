//! Statistical reductions over ensemble fields
//!
//! - [`operations`]: the reductions and the [`StatisticalReduction`] trait
//! - [`parallel`]: the NaN-aware parallel mean they all use

pub mod operations;
pub mod parallel;

pub use operations::{Reduction, StatisticalReduction};
pub use parallel::parallel_mean_axis;

use crate::errors::{Result, RuEnsError};
use ndarray::{ArrayD, ArrayViewD, Axis};

/// Average same-shape member fields into one field
///
/// # Errors
///
/// Returns an error if `members` is empty or the shapes differ.
pub fn ensemble_mean(members: &[ArrayD<f32>]) -> Result<ArrayD<f32>> {
    if members.is_empty() {
        return Err(RuEnsError::StatisticsError(
            "ensemble mean needs at least one member".to_string(),
        ));
    }

    let views: Vec<ArrayViewD<'_, f32>> = members.iter().map(|m| m.view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)?;
    stacked.reduce(Reduction::Ensemble)
}

/// Mean over the last (longitude) axis
pub fn zonal_mean(field: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    field.reduce(Reduction::Zonal)
}

/// Mean over levels of a `[time, lev, lat]` series
pub fn vertical_mean(values: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    values.reduce(Reduction::Vertical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn array(shape: &[usize], values: Vec<f32>) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
    }

    #[test]
    fn mean_skips_nan() {
        let data = array(&[2, 3], vec![1.0, f32::NAN, 3.0, 4.0, 5.0, f32::INFINITY]);
        let zonal = zonal_mean(&data).unwrap();
        assert_eq!(zonal.shape(), &[2]);
        assert_eq!(zonal[[0]], 2.0);
        assert_eq!(zonal[[1]], 4.5);
    }

    #[test]
    fn all_nan_lane_is_nan() {
        let data = array(&[1, 2], vec![f32::NAN, f32::NAN]);
        assert!(zonal_mean(&data).unwrap()[[0]].is_nan());
    }

    #[test]
    fn ensemble_mean_averages_members() {
        let a = array(&[2], vec![1.0, 10.0]);
        let b = array(&[2], vec![3.0, f32::NAN]);
        let mean = ensemble_mean(&[a, b]).unwrap();
        assert_eq!(mean[[0]], 2.0);
        assert_eq!(mean[[1]], 10.0);
    }

    #[test]
    fn ensemble_mean_rejects_mismatched_members() {
        let a = array(&[2], vec![1.0, 2.0]);
        let b = array(&[3], vec![1.0, 2.0, 3.0]);
        assert!(ensemble_mean(&[a, b]).is_err());
        assert!(ensemble_mean(&[]).is_err());
    }

    #[test]
    fn vertical_mean_needs_rank_three() {
        let series = array(&[1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let mean = vertical_mean(&series).unwrap();
        assert_eq!(mean.shape(), &[1, 2]);
        assert_eq!(mean[[0, 0]], 2.0);
        assert_eq!(mean[[0, 1]], 3.0);
        assert!(vertical_mean(&array(&[2], vec![0.0, 0.0])).is_err());
    }

    #[test]
    fn out_of_range_axis_is_an_error() {
        let data = array(&[2], vec![1.0, 2.0]);
        assert!(matches!(
            parallel_mean_axis(&data, 3),
            Err(RuEnsError::StatisticsError(_))
        ));
    }
}
