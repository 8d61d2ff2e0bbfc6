//! Download the raw CMIP6 ensemble from the ESGF federation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::catalog::client::{DatasetRecord, EsgfClient, DEFAULT_SEARCH_ENDPOINT};
use crate::catalog::member::{MemberKey, VariantKey};
use crate::catalog::{areacella_source_alias, complete_groups, first_variant_groups};
use crate::cli::{create_progress_bar, create_spinner, Case};
use crate::folders::create_dir;
use crate::regrid::AREACELLA;
use crate::store::StoreIndex;

use super::DOWNLOADS_DIR;

pub async fn download(
    data_dir: &Path,
    case: Case,
    clear: bool,
    one_variant_per_model: bool,
) -> Result<String> {
    let download_dir = create_dir(data_dir, DOWNLOADS_DIR, clear)?;
    let criteria = case.criteria();
    let client = EsgfClient::new(DEFAULT_SEARCH_ENDPOINT);

    let spinner = create_spinner("Searching the ESGF catalog...".to_string());
    let records = client.search_files(&criteria).await?;
    spinner.finish_with_message(format!("Found {} file entries", records.len()));

    let mut groups = complete_groups(records, &criteria);
    if one_variant_per_model {
        groups = first_variant_groups(groups);
    }
    println!(
        "{} complete runs ({} files each)",
        groups.len(),
        criteria.expected_file_count()
    );

    // one extra file per run for the native cell areas
    let total_files: usize = groups.values().map(Vec::len).sum::<usize>() + groups.len();
    let pb = create_progress_bar(total_files as u64, "Downloading files...".to_string());

    let mut index = StoreIndex::default();
    for (variant, group) in &groups {
        for record in group {
            let path = client.download(record, &download_dir).await?;
            index.push(&record.key, file_name(&path)?);
            pb.inc(1);
        }

        let area_record = find_areacella(&client, variant).await?;
        let path = client.download(&area_record, &download_dir).await?;
        // indexed under the run's own identity so later stages need no alias
        let manifest_key = MemberKey {
            source_id: variant.source_id.clone(),
            member_id: variant.member_id.clone(),
            grid_label: variant.grid_label.clone(),
            experiment_id: area_record.key.experiment_id.clone(),
            variable_id: AREACELLA.to_string(),
        };
        index.push(&manifest_key, file_name(&path)?);
        pb.inc(1);
    }
    pb.finish_with_message("Downloads complete");

    index.write(&download_dir)?;

    Ok(download_dir.to_string_lossy().to_string())
}

async fn find_areacella(client: &EsgfClient, variant: &VariantKey) -> Result<DatasetRecord> {
    let source_id = areacella_source_alias(&variant.source_id);
    let hits = client
        .search_areacella(source_id, &variant.grid_label)
        .await?;

    hits.into_iter().next().with_context(|| {
        format!(
            "no areacella entry published for `{source_id}` on grid `{}`",
            variant.grid_label
        )
    })
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .context("downloaded file has no name")?
        .to_string_lossy()
        .to_string())
}
