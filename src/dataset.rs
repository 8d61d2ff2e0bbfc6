//! In-memory ensemble-member record: named variable fields on one grid.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use ndarray::ArrayD;

use crate::regrid::Grid;

/// Cloud-fraction variable, delivered by some models in percent.
pub const CLOUD_FRACTION: &str = "clt";

/// A named collection of variable fields sharing one lat/lon grid.
///
/// Fields are either `(month, lat, lon)` climatology cubes or `(lat, lon)`
/// maps (the cell-area field). The trailing two axes of every field must
/// match the coordinate lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    lat: Vec<f64>,
    lon: Vec<f64>,
    variables: BTreeMap<String, ArrayD<f64>>,
}

impl Dataset {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>) -> Self {
        Dataset {
            lat,
            lon,
            variables: BTreeMap::new(),
        }
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.lat.clone(), self.lon.clone())
    }

    /// Adds (or replaces) a variable field, checking its spatial shape.
    pub fn add_variable(&mut self, name: &str, values: ArrayD<f64>) -> Result<()> {
        let shape = values.shape();
        if shape.len() != 2 && shape.len() != 3 {
            bail!(
                "variable `{}` has rank {}, expected a (lat, lon) map or (month, lat, lon) cube",
                name,
                shape.len()
            );
        }

        let (rows, cols) = (shape[shape.len() - 2], shape[shape.len() - 1]);
        if rows != self.lat.len() || cols != self.lon.len() {
            bail!(
                "variable `{}` is shaped ({}, {}) but the grid is ({}, {})",
                name,
                rows,
                cols,
                self.lat.len(),
                self.lon.len()
            );
        }

        self.variables.insert(name.to_string(), values);
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    /// Rescales a cloud fraction delivered in percent down to a fraction.
    /// Values already in [0, 1] are left alone.
    pub fn normalise_cloud_fraction(&mut self) {
        if let Some(clt) = self.variables.get_mut(CLOUD_FRACTION) {
            let max = clt.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if max > 1.0 {
                clt.mapv_inplace(|v| v / 100.0);
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn small_dataset() -> Dataset {
        Dataset::new(vec![-45.0, 45.0], vec![0.0, 120.0, 240.0])
    }

    #[test]
    fn should_accept_matching_map_and_cube() {
        let mut ds = small_dataset();

        ds.add_variable("areacella", ArrayD::zeros(vec![2, 3])).unwrap();
        ds.add_variable("rsdt", ArrayD::zeros(vec![12, 2, 3])).unwrap();

        assert_eq!(ds.variable_names(), vec!["areacella", "rsdt"]);
        assert_eq!(ds.variable("rsdt").unwrap().shape(), &[12, 2, 3]);
    }

    #[test]
    fn should_reject_wrong_spatial_shape() {
        let mut ds = small_dataset();
        assert!(ds.add_variable("rsdt", ArrayD::zeros(vec![12, 3, 2])).is_err());
    }

    #[test]
    fn should_reject_wrong_rank() {
        let mut ds = small_dataset();
        assert!(ds.add_variable("rsdt", ArrayD::zeros(vec![6])).is_err());
    }

    #[test]
    fn should_rescale_percent_cloud_fraction() {
        let mut ds = small_dataset();
        ds.add_variable(CLOUD_FRACTION, ArrayD::from_elem(vec![2, 3], 85.0))
            .unwrap();

        ds.normalise_cloud_fraction();

        let clt = ds.variable(CLOUD_FRACTION).unwrap();
        assert!((clt[[0, 0]] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn should_leave_fractional_cloud_fraction_alone() {
        let mut ds = small_dataset();
        ds.add_variable(CLOUD_FRACTION, ArrayD::from_elem(vec![2, 3], 0.85))
            .unwrap();

        ds.normalise_cloud_fraction();

        let clt = ds.variable(CLOUD_FRACTION).unwrap();
        assert!((clt[[0, 0]] - 0.85).abs() < 1e-12);
    }
}
