//! Common-grid reconciliation and regridding of a model ensemble.
//!
//! The ensemble members arrive on heterogeneous lat/lon grids. A single
//! common grid is derived from the coarsest spacing present in the ensemble,
//! snapped so it tiles the sphere with a whole number of cells, and every
//! member is conservatively projected onto it. The common grid's per-cell
//! surface area is attached to every regridded member as `areacella`.

pub mod conservative;
mod ensemble;

pub use ensemble::regrid_ensemble;

use ndarray::Array2;
use thiserror::Error;

/// Mean Earth radius, metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Full longitude domain extent in degrees.
pub const LON_EXTENT: f64 = 360.0;

/// Full latitude domain extent in degrees.
pub const LAT_EXTENT: f64 = 180.0;

/// Variable name under which the cell-area field is stored.
pub const AREACELLA: &str = "areacella";

#[derive(Debug, Error, PartialEq)]
pub enum RegridError {
    /// The requested step cannot tile the domain even once.
    #[error("step {step}° exceeds the {extent}° domain extent, no regular grid exists")]
    DegenerateStep { step: f64, extent: f64 },

    /// A coordinate axis too short to have a spacing.
    #[error("coordinate axis has {len} points, need at least 2 to derive a step")]
    ShortCoordinateAxis { len: usize },

    /// No members to reconcile a grid from.
    #[error("cannot derive a common grid from an empty ensemble")]
    EmptyEnsemble,

    /// A member is missing one of the variables to transfer.
    #[error("member `{key}` has no variable `{variable}`")]
    MissingVariable { key: String, variable: String },

    /// A field's shape disagrees with its grid.
    #[error("field shape ({rows}, {cols}) does not match grid ({n_lat}, {n_lon})")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        n_lat: usize,
        n_lon: usize,
    },
}

/// A rectangular lat/lon grid given by its cell-center coordinates.
///
/// Latitudes are strictly increasing over [-90, 90], longitudes strictly
/// increasing over [0, 360).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

impl Grid {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>) -> Self {
        Grid { lat, lon }
    }

    /// (n_lat, n_lon)
    pub fn shape(&self) -> (usize, usize) {
        (self.lat.len(), self.lon.len())
    }
}

/// The step of a coordinate axis: the largest gap between consecutive points.
///
/// Using the maximum rather than the mean guarantees the result is no finer
/// than the coarsest spacing actually present, so a grid built from it never
/// requires upsampling this axis.
pub fn axis_step(coords: &[f64]) -> Result<f64, RegridError> {
    if coords.len() < 2 {
        return Err(RegridError::ShortCoordinateAxis { len: coords.len() });
    }

    Ok(coords
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold(f64::NEG_INFINITY, f64::max))
}

/// The mean gap between consecutive points of a coordinate axis.
pub fn mean_axis_step(coords: &[f64]) -> Result<f64, RegridError> {
    if coords.len() < 2 {
        return Err(RegridError::ShortCoordinateAxis { len: coords.len() });
    }

    Ok((coords[coords.len() - 1] - coords[0]) / (coords.len() - 1) as f64)
}

/// Adjusts a step so the domain extent divides into a whole number of equal
/// intervals. The interval count is the integer part of `extent / step`, so
/// the returned step is always coarser than or equal to the input; a step
/// that already divides the extent exactly comes back unchanged.
pub fn regular_grid_step(step: f64, extent: f64) -> Result<f64, RegridError> {
    let intervals = (extent / step).floor();
    if !(intervals >= 1.0) {
        return Err(RegridError::DegenerateStep { step, extent });
    }

    Ok(extent / intervals)
}

/// The coarsest (lon, lat) steps across the ensemble, each snapped to divide
/// its domain extent into a whole number of intervals.
pub fn coarsest_regular_steps<'a, I>(grids: I) -> Result<(f64, f64), RegridError>
where
    I: IntoIterator<Item = &'a Grid>,
{
    let mut max_lon_step = f64::NEG_INFINITY;
    let mut max_lat_step = f64::NEG_INFINITY;
    let mut seen = false;

    for grid in grids {
        max_lon_step = max_lon_step.max(axis_step(&grid.lon)?);
        max_lat_step = max_lat_step.max(axis_step(&grid.lat)?);
        seen = true;
    }

    if !seen {
        return Err(RegridError::EmptyEnsemble);
    }

    let lon_step = regular_grid_step(max_lon_step, LON_EXTENT)?;
    let lat_step = regular_grid_step(max_lat_step, LAT_EXTENT)?;

    Ok((lon_step, lat_step))
}

/// The coarsest regular grid the whole ensemble can be projected onto without
/// upsampling any member.
///
/// Longitudes run from 0 inclusive up to (not including) 360. Latitude
/// centers are offset by half a step so the grid is symmetric about the
/// equator, with cell bounds landing exactly on -90 and 90.
pub fn common_coarse_grid<'a, I>(grids: I) -> Result<Grid, RegridError>
where
    I: IntoIterator<Item = &'a Grid>,
{
    let (lon_step, lat_step) = coarsest_regular_steps(grids)?;

    let n_lon = (LON_EXTENT / lon_step).round() as usize;
    let lon = (0..n_lon).map(|i| i as f64 * lon_step).collect();

    let n_lat = (LAT_EXTENT / lat_step).round() as usize;
    let lat = (0..n_lat)
        .map(|i| -90.0 + lat_step / 2.0 + i as f64 * lat_step)
        .collect();

    Ok(Grid::new(lat, lon))
}

/// Per-cell surface area of a grid, shaped `(n_lat, n_lon)`, in m².
///
/// Each cell is treated as a planar rectangle `(R·Δlat) × (R·cos(lat)·Δlon)`
/// with Δ the mean angular spacing per axis. The cos(lat) factor is the only
/// spherical correction, so areas shrink toward zero at the poles.
pub fn cell_areas(grid: &Grid) -> Result<Array2<f64>, RegridError> {
    let dlat_rad = mean_axis_step(&grid.lat)?.to_radians();
    let dlon_rad = mean_axis_step(&grid.lon)?.to_radians();

    let (n_lat, n_lon) = grid.shape();
    let mut areas = Array2::zeros((n_lat, n_lon));

    for (i, lat) in grid.lat.iter().enumerate() {
        let cell = (EARTH_RADIUS_M * dlat_rad)
            * (EARTH_RADIUS_M * lat.to_radians().cos() * dlon_rad);
        areas.row_mut(i).fill(cell);
    }

    Ok(areas)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    #[test]
    fn should_take_largest_gap_as_step() {
        assert_eq!(axis_step(&[0.0, 1.0, 3.0, 4.0]).unwrap(), 2.0);
    }

    #[test]
    fn should_reject_single_point_axis() {
        assert_eq!(
            axis_step(&[0.0]),
            Err(RegridError::ShortCoordinateAxis { len: 1 })
        );
    }

    #[test]
    fn should_snap_step_coarser_to_divide_domain() {
        // floor(360 / 70) = 5 intervals, 360 / 5 = 72
        let snapped = regular_grid_step(70.0, 360.0).unwrap();
        assert!(snapped >= 70.0);
        assert_abs_diff_eq!(360.0 % snapped, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(snapped, 72.0);
    }

    #[test]
    fn should_leave_exact_step_unchanged() {
        assert_abs_diff_eq!(regular_grid_step(90.0, 360.0).unwrap(), 90.0);
        assert_abs_diff_eq!(regular_grid_step(3.0, 360.0).unwrap(), 3.0);
    }

    #[test]
    fn should_fail_on_step_larger_than_domain() {
        assert_eq!(
            regular_grid_step(400.0, 360.0),
            Err(RegridError::DegenerateStep {
                step: 400.0,
                extent: 360.0
            })
        );
    }

    #[test]
    fn should_fail_on_empty_ensemble() {
        assert_eq!(
            common_coarse_grid(std::iter::empty()),
            Err(RegridError::EmptyEnsemble)
        );
    }

    #[test]
    fn should_reconcile_from_coarsest_member() {
        let members = [
            Grid::new(regular_axis(-89.5, 1.0, 180), regular_axis(0.0, 1.0, 360)),
            Grid::new(regular_axis(-89.0, 2.0, 90), regular_axis(0.0, 2.0, 180)),
            Grid::new(regular_axis(-88.75, 2.5, 72), regular_axis(0.0, 2.5, 144)),
        ];

        let (lon_step, _) = coarsest_regular_steps(members.iter()).unwrap();
        assert!(lon_step >= 2.5);
        assert_abs_diff_eq!(360.0 % lon_step, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn should_return_single_regular_member_unchanged() {
        let member = Grid::new(regular_axis(-88.5, 3.0, 60), regular_axis(0.0, 3.0, 120));
        let common = common_coarse_grid(std::iter::once(&member)).unwrap();

        assert_eq!(common.shape(), member.shape());
        for (a, b) in common.lat.iter().zip(member.lat.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
        for (a, b) in common.lon.iter().zip(member.lon.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn should_center_latitudes_on_equator() {
        let member = Grid::new(regular_axis(-87.5, 5.0, 36), regular_axis(0.0, 5.0, 72));
        let common = common_coarse_grid(std::iter::once(&member)).unwrap();

        assert_abs_diff_eq!(common.lat[0], -87.5);
        assert_abs_diff_eq!(common.lat[common.lat.len() - 1], 87.5);
        assert_abs_diff_eq!(common.lon[0], 0.0);
        assert!(common.lon[common.lon.len() - 1] < 360.0);
        // symmetric about the equator
        let mid = common.lat.len() / 2;
        assert_abs_diff_eq!(common.lat[mid - 1], -common.lat[mid], epsilon = 1e-9);
    }

    #[test]
    fn should_shrink_cell_areas_toward_poles() {
        let grid = Grid::new(regular_axis(-87.5, 5.0, 36), regular_axis(0.0, 5.0, 72));
        let areas = cell_areas(&grid).unwrap();

        // strictly decreasing in |lat| for a fixed lon column
        for i in 0..grid.lat.len() - 1 {
            let (a, b) = (areas[[i, 0]], areas[[i + 1, 0]]);
            if grid.lat[i] < 0.0 && grid.lat[i + 1] <= 0.0 {
                assert!(b > a, "area must grow toward the equator");
            }
            if grid.lat[i] >= 0.0 {
                assert!(b < a, "area must shrink toward the pole");
            }
            assert!(a > 0.0);
        }

        // near-zero at the poles relative to the equator
        let equator = areas[[grid.lat.len() / 2, 0]];
        let pole = areas[[0, 0]];
        assert!(pole < equator * 0.1);
    }
}
