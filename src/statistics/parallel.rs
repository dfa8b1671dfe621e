//! Parallel computation implementations for statistical operations

use crate::errors::{Result, RuEnsError};
use ndarray::{ArrayD, ArrayView1, Axis, Zip};

/// Computes mean along an axis using parallel processing
///
/// Accumulates in f64 to avoid precision loss and skips NaN and infinite
/// values. A lane without any finite value yields NaN.
///
/// # Errors
///
/// Returns an error if the axis is out of bounds.
pub fn parallel_mean_axis(data: &ArrayD<f32>, axis: usize) -> Result<ArrayD<f32>> {
    if axis >= data.ndim() {
        return Err(RuEnsError::StatisticsError(format!(
            "Axis {axis} is out of bounds for array with {} dimensions",
            data.ndim()
        )));
    }

    tracing::trace!(
        shape = ?data.shape(),
        axis,
        threads = rayon::current_num_threads(),
        "parallel mean"
    );

    Ok(Zip::from(data.lanes(Axis(axis))).par_map_collect(finite_mean))
}

fn finite_mean(lane: ArrayView1<'_, f32>) -> f32 {
    let (sum, count) = lane
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0_u32), |(sum, count), &v| {
            (sum + f64::from(v), count + 1)
        });

    if count > 0 {
        #[allow(clippy::cast_possible_truncation)]
        {
            (sum / f64::from(count)) as f32
        }
    } else {
        f32::NAN
    }
}
