//! Regrid the climatology store onto its common coarse grid.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::Case;
use crate::dataset::Dataset;
use crate::folders::create_dir;
use crate::regrid::{common_coarse_grid, regrid_ensemble};
use crate::store::{load_ensemble, save_ensemble};

use super::{CLIMATOLOGIES_DIR, REGRIDDED_DIR};

pub fn regrid(data_dir: &Path, case: Case) -> Result<String> {
    let criteria = case.criteria();
    let climatology_dir = data_dir.join(CLIMATOLOGIES_DIR);
    let members = load_ensemble(&climatology_dir)
        .with_context(|| format!("no climatology store in `{}`", climatology_dir.display()))?;

    let grids: Vec<_> = members.values().map(Dataset::grid).collect();
    let common = common_coarse_grid(grids.iter())?;
    let (n_lat, n_lon) = common.shape();
    println!(
        "Common grid: {n_lat} x {n_lon} cells ({:.2}° x {:.2}°)",
        180.0 / n_lat as f64,
        360.0 / n_lon as f64
    );

    println!("Regridding {} members...", members.len());
    let regridded = regrid_ensemble(&members, &criteria.variable_id, &common)?;

    let out_dir = create_dir(data_dir, REGRIDDED_DIR, true)?;
    save_ensemble(&regridded, &out_dir)?;

    Ok(out_dir.to_string_lossy().to_string())
}
