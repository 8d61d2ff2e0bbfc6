//! On-disk store for keyed ensembles: one netCDF file per entry plus an
//! index file recording which key each file belongs to.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::member::{ClimatologyKey, KeyParseError};
use crate::dataset::Dataset;

/// Name of the index file inside a store directory.
pub const INDEX_FILE: &str = "index.json";

const MONTH_DIM: &str = "month";
const LAT_DIM: &str = "lat";
const LON_DIM: &str = "lon";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("netcdf error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("index error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Key(#[from] KeyParseError),

    #[error("index lists `{key}` at `{path}` but the file cannot be read")]
    MissingEntryFile { key: String, path: PathBuf },

    #[error("`{path}`: {reason}")]
    MalformedEntry { path: PathBuf, reason: String },
}

/// Key → relative-path listing, serialised as the store's `index.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreIndex {
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub path: String,
}

impl StoreIndex {
    pub fn push(&mut self, key: impl ToString, path: impl Into<String>) {
        self.entries.push(IndexEntry {
            key: key.to_string(),
            path: path.into(),
        });
    }

    pub fn write(&self, dir: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(INDEX_FILE), text)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Self, StoreError> {
        let text = fs::read_to_string(dir.join(INDEX_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Saves every entry as `<key with dots replaced>.nc` under `dir` and writes
/// the index alongside them.
pub fn save_ensemble(
    ensemble: &BTreeMap<ClimatologyKey, Dataset>,
    dir: &Path,
) -> Result<(), StoreError> {
    let mut index = StoreIndex::default();

    for (key, dataset) in ensemble {
        let file_name = format!("{}.nc", key.file_stem());
        write_dataset(dataset, &dir.join(&file_name))?;
        index.push(key, file_name);
    }

    index.write(dir)?;
    Ok(())
}

/// Reloads a store saved by [`save_ensemble`].
pub fn load_ensemble(dir: &Path) -> Result<BTreeMap<ClimatologyKey, Dataset>, StoreError> {
    let index = StoreIndex::read(dir)?;
    let mut ensemble = BTreeMap::new();

    for entry in &index.entries {
        let key: ClimatologyKey = entry.key.parse()?;
        let path = dir.join(&entry.path);
        let dataset = read_dataset(&path).map_err(|_| StoreError::MissingEntryFile {
            key: entry.key.clone(),
            path: path.clone(),
        })?;
        ensemble.insert(key, dataset);
    }

    Ok(ensemble)
}

fn write_dataset(dataset: &Dataset, path: &Path) -> Result<(), StoreError> {
    let mut file = netcdf::create(path)?;

    file.add_dimension(LAT_DIM, dataset.lat().len())?;
    file.add_dimension(LON_DIM, dataset.lon().len())?;

    let mut lat_var = file.add_variable::<f64>(LAT_DIM, &[LAT_DIM])?;
    lat_var.put_values(dataset.lat(), ..)?;
    lat_var.put_attribute("units", "degrees_north")?;

    let mut lon_var = file.add_variable::<f64>(LON_DIM, &[LON_DIM])?;
    lon_var.put_values(dataset.lon(), ..)?;
    lon_var.put_attribute("units", "degrees_east")?;

    let needs_month = dataset.variables().any(|(_, values)| values.ndim() == 3);
    if needs_month {
        file.add_dimension(MONTH_DIM, 12)?;
        let months: Vec<i32> = (1..=12).collect();
        let mut month_var = file.add_variable::<i32>(MONTH_DIM, &[MONTH_DIM])?;
        month_var.put_values(&months, ..)?;
    }

    for (name, values) in dataset.variables() {
        let dims: &[&str] = match values.ndim() {
            2 => &[LAT_DIM, LON_DIM],
            _ => &[MONTH_DIM, LAT_DIM, LON_DIM],
        };
        let mut var = file.add_variable::<f64>(name, dims)?;
        let flat = values.as_standard_layout();
        var.put_values(
            flat.as_slice().expect("standard layout is contiguous"),
            ..,
        )?;
    }

    Ok(())
}

fn read_dataset(path: &Path) -> Result<Dataset, StoreError> {
    let file = netcdf::open(path)?;

    let lat = read_axis(&file, LAT_DIM, path)?;
    let lon = read_axis(&file, LON_DIM, path)?;
    let mut dataset = Dataset::new(lat, lon);

    for var in file.variables() {
        let name = var.name();
        if name == LAT_DIM || name == LON_DIM || name == MONTH_DIM {
            continue;
        }

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let flat: Vec<f64> = var.get_values(..)?;
        let values =
            ArrayD::from_shape_vec(shape, flat).map_err(|e| StoreError::MalformedEntry {
                path: path.to_path_buf(),
                reason: format!("variable `{name}`: {e}"),
            })?;

        dataset
            .add_variable(&name, values)
            .map_err(|e| StoreError::MalformedEntry {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
    }

    Ok(dataset)
}

fn read_axis(file: &netcdf::File, name: &str, path: &Path) -> Result<Vec<f64>, StoreError> {
    let var = file.variable(name).ok_or_else(|| StoreError::MalformedEntry {
        path: path.to_path_buf(),
        reason: format!("missing `{name}` coordinate"),
    })?;
    Ok(var.get_values(..)?)
}

// -- Tests -------------------------------------------------------------------
