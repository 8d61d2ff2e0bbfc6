//! Area-weighted spatial averaging of regridded fields.

use anyhow::{ensure, Result};
use ndarray::{ArrayView2, ArrayView3, Axis};

/// Area-weighted mean of a `(lat, lon)` field, rounded to two decimals
/// (the convention of the downstream summary tables).
pub fn spatial_average(field: ArrayView2<'_, f64>, areas: ArrayView2<'_, f64>) -> Result<f64> {
    ensure!(
        field.dim() == areas.dim(),
        "field shaped {:?} but area weights shaped {:?}",
        field.dim(),
        areas.dim()
    );

    let total_weight: f64 = areas.sum();
    ensure!(total_weight > 0.0, "area weights sum to zero");

    let weighted: f64 = field
        .iter()
        .zip(areas.iter())
        .map(|(value, weight)| value * weight)
        .sum();

    Ok(round2(weighted / total_weight))
}

/// Per-month spatial averages of a `(month, lat, lon)` cube.
pub fn monthly_spatial_averages(
    cube: ArrayView3<'_, f64>,
    areas: ArrayView2<'_, f64>,
) -> Result<Vec<f64>> {
    (0..cube.len_of(Axis(0)))
        .map(|month| spatial_average(cube.index_axis(Axis(0), month), areas))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array2, Array3};

    #[test]
    fn should_equal_plain_mean_for_uniform_weights() {
        let field = arr2(&[[2.0, 1.0, 2.0], [1.0, 0.0, 1.0], [2.0, 1.0, 2.0]]);
        let areas = Array2::from_elem((3, 3), 5.0e9);

        let avg = spatial_average(field.view(), areas.view()).unwrap();
        assert_abs_diff_eq!(avg, 1.33);
    }

    #[test]
    fn should_weight_by_cell_area() {
        let field = arr2(&[[10.0], [0.0]]);
        let areas = arr2(&[[3.0], [1.0]]);

        let avg = spatial_average(field.view(), areas.view()).unwrap();
        assert_abs_diff_eq!(avg, 7.5);
    }

    #[test]
    fn should_reject_mismatched_weights() {
        let field = Array2::<f64>::zeros((2, 2));
        let areas = Array2::<f64>::ones((3, 2));
        assert!(spatial_average(field.view(), areas.view()).is_err());
    }

    #[test]
    fn should_average_each_month_independently() {
        let mut cube = Array3::zeros((2, 2, 2));
        cube.index_axis_mut(Axis(0), 0).fill(1.0);
        cube.index_axis_mut(Axis(0), 1).fill(3.0);
        let areas = Array2::from_elem((2, 2), 2.0);

        let avgs = monthly_spatial_averages(cube.view(), areas.view()).unwrap();
        assert_eq!(avgs, vec![1.0, 3.0]);
    }
}
