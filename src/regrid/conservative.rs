//! Area-conservative remapping between rectangular lat/lon grids.
//!
//! Cells are bounded by constant-latitude and constant-longitude lines, not
//! great circles. Both grids here are plain rectangular lat/lon grids, so the
//! simpler assumption is exact and avoids the spurious error a great-circle
//! remapper would introduce.
//!
//! The remap factorises per axis: a destination/source overlap-weight matrix
//! for latitude (overlaps measured in sin(lat), i.e. true spherical band
//! areas) and one for longitude (overlaps in degrees, periodic over 360).
//! A destination cell's value is the overlap-weighted average of the source
//! cells it covers, which preserves the area integral of the field.

use ndarray::{Array2, ArrayView2};

use super::{Grid, RegridError};

/// Cell bounds from cell centers: midpoints between neighbours, end bounds
/// extrapolated by half the edge spacing and clamped to the poles.
pub fn lat_bounds(centers: &[f64]) -> Vec<f64> {
    let bounds = open_bounds(centers);
    bounds.into_iter().map(|b| b.clamp(-90.0, 90.0)).collect()
}

/// Longitude cell bounds; unclamped, the overlap handles the 360° wrap.
pub fn lon_bounds(centers: &[f64]) -> Vec<f64> {
    open_bounds(centers)
}

fn open_bounds(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    let mut bounds = Vec::with_capacity(n + 1);

    bounds.push(centers[0] - (centers[1] - centers[0]) / 2.0);
    for i in 0..n - 1 {
        bounds.push((centers[i] + centers[i + 1]) / 2.0);
    }
    bounds.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);

    bounds
}

/// Latitude overlap weights, shaped (n_dst, n_src). The weight of a
/// source band inside a destination band is the sine-latitude extent of
/// their intersection, proportional to the spherical area of the strip.
fn lat_weights(src: &[f64], dst: &[f64]) -> Array2<f64> {
    let sb = lat_bounds(src);
    let db = lat_bounds(dst);

    let mut weights = Array2::zeros((dst.len(), src.len()));
    for d in 0..dst.len() {
        for s in 0..src.len() {
            let lo = db[d].max(sb[s]).to_radians().sin();
            let hi = db[d + 1].min(sb[s + 1]).to_radians().sin();
            if hi > lo {
                weights[[d, s]] = hi - lo;
            }
        }
    }

    weights
}

/// Longitude overlap weights, shaped (n_dst, n_src), in degrees. Source
/// intervals are tested at -360/0/+360 shifts so cells straddling the seam
/// still find their destination.
fn lon_weights(src: &[f64], dst: &[f64]) -> Array2<f64> {
    let sb = lon_bounds(src);
    let db = lon_bounds(dst);

    let mut weights = Array2::zeros((dst.len(), src.len()));
    for d in 0..dst.len() {
        for s in 0..src.len() {
            let mut overlap = 0.0;
            for shift in [-360.0, 0.0, 360.0] {
                let lo = db[d].max(sb[s] + shift);
                let hi = db[d + 1].min(sb[s + 1] + shift);
                if hi > lo {
                    overlap += hi - lo;
                }
            }
            weights[[d, s]] = overlap;
        }
    }

    weights
}

/// Conservatively remaps a `(lat, lon)` field from `src` onto `dst`.
pub fn remap(
    field: ArrayView2<'_, f64>,
    src: &Grid,
    dst: &Grid,
) -> Result<Array2<f64>, RegridError> {
    let (rows, cols) = field.dim();
    let (n_lat, n_lon) = src.shape();
    if (rows, cols) != (n_lat, n_lon) {
        return Err(RegridError::ShapeMismatch {
            rows,
            cols,
            n_lat,
            n_lon,
        });
    }
    if src.lat.len() < 2 || src.lon.len() < 2 {
        return Err(RegridError::ShortCoordinateAxis {
            len: src.lat.len().min(src.lon.len()),
        });
    }
    if dst.lat.len() < 2 || dst.lon.len() < 2 {
        return Err(RegridError::ShortCoordinateAxis {
            len: dst.lat.len().min(dst.lon.len()),
        });
    }

    let w_lat = lat_weights(&src.lat, &dst.lat);
    let w_lon = lon_weights(&src.lon, &dst.lon);

    // total overlap measure per destination cell, for the average
    let lat_cover = w_lat.sum_axis(ndarray::Axis(1));
    let lon_cover = w_lon.sum_axis(ndarray::Axis(1));

    let weighted = w_lat.dot(&field).dot(&w_lon.t());

    let mut result = weighted;
    for d_lat in 0..dst.lat.len() {
        for d_lon in 0..dst.lon.len() {
            let cover = lat_cover[d_lat] * lon_cover[d_lon];
            result[[d_lat, d_lon]] = if cover > 0.0 {
                result[[d_lat, d_lon]] / cover
            } else {
                f64::NAN
            };
        }
    }

    Ok(result)
}

// -- Tests -------------------------------------------------------------------
