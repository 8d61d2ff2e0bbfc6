//! Reads downloaded CMIP6 netCDF files into arrays.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use ndarray::{Array2, Array3};

use crate::climatology::decode_time_axis;

/// A single variable's multi-year monthly series on its native grid.
#[derive(Debug)]
pub struct VariableSeries {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub values: Array3<f64>,
}

/// Reads a `(time, lat, lon)` variable together with its coordinates.
pub fn read_variable_series(path: &Path, variable: &str) -> Result<VariableSeries> {
    let file = netcdf::open(path)
        .with_context(|| format!("opening `{}`", path.display()))?;

    let lat = read_coordinate(&file, "lat", path)?;
    let lon = read_coordinate(&file, "lon", path)?;
    let dates = read_time_axis(&file, path)?;

    let var = file
        .variable(variable)
        .with_context(|| format!("`{}` has no variable `{variable}`", path.display()))?;
    let flat: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("reading `{variable}` from `{}`", path.display()))?;

    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let [n_time, n_lat, n_lon] = dims[..] else {
        bail!(
            "`{variable}` in `{}` has dimensions {dims:?}, expected (time, lat, lon)",
            path.display()
        );
    };
    if n_time != dates.len() || n_lat != lat.len() || n_lon != lon.len() {
        bail!(
            "`{variable}` in `{}` is shaped ({n_time}, {n_lat}, {n_lon}) but its coordinates are ({}, {}, {})",
            path.display(),
            dates.len(),
            lat.len(),
            lon.len()
        );
    }

    let values = Array3::from_shape_vec((n_time, n_lat, n_lon), flat)
        .context("reshaping variable values")?;

    Ok(VariableSeries {
        lat,
        lon,
        dates,
        values,
    })
}

/// Reads a static `(lat, lon)` map such as the native cell-area field.
pub fn read_area_map(path: &Path, variable: &str) -> Result<(Vec<f64>, Vec<f64>, Array2<f64>)> {
    let file = netcdf::open(path)
        .with_context(|| format!("opening `{}`", path.display()))?;

    let lat = read_coordinate(&file, "lat", path)?;
    let lon = read_coordinate(&file, "lon", path)?;

    let var = file
        .variable(variable)
        .with_context(|| format!("`{}` has no variable `{variable}`", path.display()))?;
    let flat: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("reading `{variable}` from `{}`", path.display()))?;

    let values = Array2::from_shape_vec((lat.len(), lon.len()), flat)
        .with_context(|| format!("`{variable}` in `{}` is not a (lat, lon) map", path.display()))?;

    Ok((lat, lon, values))
}

fn read_coordinate(file: &netcdf::File, name: &str, path: &Path) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .with_context(|| format!("`{}` has no `{name}` coordinate", path.display()))?;
    var.get_values(..)
        .with_context(|| format!("reading `{name}` from `{}`", path.display()))
}

fn read_time_axis(file: &netcdf::File, path: &Path) -> Result<Vec<NaiveDate>> {
    let var = file
        .variable("time")
        .with_context(|| format!("`{}` has no `time` coordinate", path.display()))?;
    let values: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("reading `time` from `{}`", path.display()))?;

    let units = match var.attribute("units") {
        Some(attr) => match attr.value() {
            Ok(netcdf::AttributeValue::Str(s)) => s,
            _ => bail!("`time` units in `{}` are not a string", path.display()),
        },
        None => bail!("`time` in `{}` carries no units attribute", path.display()),
    };

    decode_time_axis(&values, &units)
}
