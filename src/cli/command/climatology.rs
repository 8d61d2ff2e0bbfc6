//! Build the monthly-climatology store from the raw downloads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::catalog::member::{ClimatologyKey, MemberKey, VariantKey};
use crate::cli::{create_progress_bar, Case};
use crate::climatology::monthly_climatology;
use crate::dataset::Dataset;
use crate::folders::create_dir;
use crate::reading::{read_area_map, read_variable_series};
use crate::regrid::AREACELLA;
use crate::store::{save_ensemble, StoreIndex};

use super::{CLIMATOLOGIES_DIR, DOWNLOADS_DIR};

pub fn climatology(data_dir: &Path, case: Case) -> Result<String> {
    let criteria = case.criteria();
    let download_dir = data_dir.join(DOWNLOADS_DIR);
    let index = StoreIndex::read(&download_dir)
        .with_context(|| format!("no download manifest in `{}`", download_dir.display()))?;

    // split the manifest into variable series and native cell-area maps
    let mut area_files: BTreeMap<VariantKey, PathBuf> = BTreeMap::new();
    let mut groups: BTreeMap<ClimatologyKey, BTreeMap<String, PathBuf>> = BTreeMap::new();
    let mut variants: BTreeMap<ClimatologyKey, VariantKey> = BTreeMap::new();

    for entry in &index.entries {
        let key: MemberKey = entry.key.parse()?;
        let path = download_dir.join(&entry.path);

        if key.variable_id == AREACELLA {
            area_files.insert(key.variant_key(), path);
        } else {
            let clim_key = key.climatology_key();
            variants.entry(clim_key.clone()).or_insert(key.variant_key());
            groups
                .entry(clim_key)
                .or_default()
                .insert(key.variable_id.clone(), path);
        }
    }

    println!("Generating climatologies for {} entries", groups.len());
    let pb = create_progress_bar(groups.len() as u64, "Computing climatologies...".to_string());

    let mut ensemble: BTreeMap<ClimatologyKey, Dataset> = BTreeMap::new();
    for (key, files) in &groups {
        let mut record: Option<Dataset> = None;

        for variable in &criteria.variable_id {
            let Some(path) = files.get(variable) else {
                bail!("`{key}` has no downloaded file for variable `{variable}`");
            };
            let series = read_variable_series(path, variable)?;
            let cube = monthly_climatology(series.values.view(), &series.dates)
                .with_context(|| format!("climatology of `{variable}` for `{key}`"))?;

            let record = record.get_or_insert_with(|| Dataset::new(series.lat, series.lon));
            record
                .add_variable(variable, cube.into_dyn())
                .with_context(|| format!("adding `{variable}` to `{key}`"))?;
        }

        let mut record = record.expect("criteria carry at least one variable");
        record.normalise_cloud_fraction();

        let variant = &variants[key];
        let area_path = area_files
            .get(variant)
            .with_context(|| format!("no cell-area file downloaded for `{variant}`"))?;
        let (_, _, areas) = read_area_map(area_path, AREACELLA)?;
        record
            .add_variable(AREACELLA, areas.into_dyn())
            .with_context(|| format!("attaching native cell areas to `{key}`"))?;

        ensemble.insert(key.clone(), record);
        pb.inc(1);
    }
    pb.finish_with_message("Climatologies computed");

    let out_dir = create_dir(data_dir, CLIMATOLOGIES_DIR, true)?;
    save_ensemble(&ensemble, &out_dir)?;

    Ok(out_dir.to_string_lossy().to_string())
}
