//! Reductions applied to ensemble fields
//!
//! All reductions are means that skip non-finite values, so fill values
//! mapped to NaN drop out of the average instead of poisoning it.

use crate::errors::{Result, RuEnsError};
use ndarray::ArrayD;

/// Supported reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Mean across stacked ensemble members (axis 0)
    Ensemble,
    /// Mean over longitude (last axis)
    Zonal,
    /// Mean over levels of a `[time, lev, lat]` series (axis 1)
    Vertical,
}

impl Reduction {
    /// Get the string representation of the reduction
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ensemble => "ensemble mean",
            Self::Zonal => "zonal mean",
            Self::Vertical => "vertical mean",
        }
    }

    /// Axis this reduction collapses for an array of rank `ndim`
    ///
    /// # Errors
    ///
    /// Returns an error if the rank cannot carry this reduction.
    pub fn axis(self, ndim: usize) -> Result<usize> {
        match (self, ndim) {
            (Self::Ensemble, n) if n >= 1 => Ok(0),
            (Self::Zonal, n) if n >= 1 => Ok(n - 1),
            (Self::Vertical, 3) => Ok(1),
            _ => Err(RuEnsError::StatisticsError(format!(
                "{} is undefined for an array with {ndim} dimensions",
                self.as_str()
            ))),
        }
    }
}

/// Trait for arrays that can be reduced along a named axis
pub trait StatisticalReduction {
    /// Apply `reduction`, returning an array with one axis fewer
    ///
    /// # Errors
    ///
    /// Returns an error if the array rank does not fit the reduction.
    fn reduce(&self, reduction: Reduction) -> Result<ArrayD<f32>>;
}

impl StatisticalReduction for ArrayD<f32> {
    fn reduce(&self, reduction: Reduction) -> Result<ArrayD<f32>> {
        let axis = reduction.axis(self.ndim())?;
        super::parallel::parallel_mean_axis(self, axis)
    }
}
