//! Write a parquet summary table of area-weighted spatial averages.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int32Array, RecordBatch, StringArray};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::regrid::AREACELLA;
use crate::stats::monthly_spatial_averages;
use crate::store::load_ensemble;

use super::{make_table_file_name, REGRIDDED_DIR};

pub fn table(data_dir: &Path, output: Option<PathBuf>) -> Result<String> {
    let regridded_dir = data_dir.join(REGRIDDED_DIR);
    let ensemble = load_ensemble(&regridded_dir)
        .with_context(|| format!("no regridded store in `{}`", regridded_dir.display()))?;

    let mut source_ids = Vec::new();
    let mut member_ids = Vec::new();
    let mut experiment_ids = Vec::new();
    let mut variables = Vec::new();
    let mut months = Vec::new();
    let mut values = Vec::new();

    for (key, record) in &ensemble {
        let areas = record
            .variable(AREACELLA)
            .with_context(|| format!("`{key}` carries no cell-area field"))?
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .context("cell-area field is not a (lat, lon) map")?;

        for (name, field) in record.variables() {
            if name == AREACELLA || field.ndim() != 3 {
                continue;
            }
            let cube = field
                .view()
                .into_dimensionality::<ndarray::Ix3>()
                .expect("rank checked");

            for (month0, average) in monthly_spatial_averages(cube, areas)?
                .into_iter()
                .enumerate()
            {
                source_ids.push(key.source_id.clone());
                member_ids.push(key.member_id.clone());
                experiment_ids.push(key.experiment_id.clone());
                variables.push(name.to_string());
                months.push(month0 as i32 + 1);
                values.push(average);
            }
        }
    }

    let file_path = output.unwrap_or_else(make_table_file_name);
    save_table(
        &file_path,
        source_ids,
        member_ids,
        experiment_ids,
        variables,
        months,
        values,
    )?;

    Ok(file_path.to_string_lossy().to_string())
}

#[allow(clippy::too_many_arguments)]
fn save_table(
    file_path: &Path,
    source_ids: Vec<String>,
    member_ids: Vec<String>,
    experiment_ids: Vec<String>,
    variables: Vec<String>,
    months: Vec<i32>,
    values: Vec<f64>,
) -> Result<()> {
    let columns: Vec<(&str, ArrayRef)> = vec![
        ("source_id", Arc::new(StringArray::from(source_ids)) as ArrayRef),
        ("member_id", Arc::new(StringArray::from(member_ids)) as ArrayRef),
        (
            "experiment_id",
            Arc::new(StringArray::from(experiment_ids)) as ArrayRef,
        ),
        ("variable", Arc::new(StringArray::from(variables)) as ArrayRef),
        ("month", Arc::new(Int32Array::from(months)) as ArrayRef),
        ("value", Arc::new(Float64Array::from(values)) as ArrayRef),
    ];
    let batch = RecordBatch::try_from_iter(columns).context("assembling the summary table")?;

    let file = File::create(file_path)
        .with_context(|| format!("creating `{}`", file_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}
