// src/export.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Float64Array, Int32Array, StringArray},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
    sync::Arc,
};
use tracing::{info, instrument};

use crate::{indicator::Indicator, table::ObservationTable};

pub fn table_schema() -> Arc<ArrowSchema> {
    Arc::new(ArrowSchema::new(vec![
        Field::new("indicator", ArrowDataType::Utf8, false),
        Field::new("entity", ArrowDataType::Utf8, false),
        Field::new("year", ArrowDataType::Int32, false),
        Field::new("value", ArrowDataType::Float64, false),
    ]))
}

/// One row per observation, ordered by indicator, entity, year.
pub fn to_record_batch(table: &ObservationTable) -> Result<RecordBatch> {
    let mut indicators = Vec::new();
    let mut entities = Vec::new();
    let mut years = Vec::new();
    let mut values = Vec::new();

    for indicator in Indicator::ALL {
        for (entity, series) in table.iter_indicator(indicator) {
            for (&year, &value) in series {
                indicators.push(indicator.as_str());
                entities.push(entity.code());
                years.push(year);
                values.push(value);
            }
        }
    }

    RecordBatch::try_new(
        table_schema(),
        vec![
            Arc::new(StringArray::from(indicators)),
            Arc::new(StringArray::from(entities)),
            Arc::new(Int32Array::from(years)),
            Arc::new(Float64Array::from(values)),
        ],
    )
    .context("building RecordBatch for observation table")
}

/// Write `table` as a snappy Parquet file. The file appears at `path` only
/// once completely written.
#[instrument(level = "info", skip(table, path), fields(path = %path.as_ref().display()))]
pub fn write_parquet<P: AsRef<Path>>(table: &ObservationTable, path: P) -> Result<usize> {
    let final_path = path.as_ref();
    let tmp_path = final_path.with_extension("parquet.tmp");
    let batch = to_record_batch(table)?;

    let tmp_file = File::create(&tmp_path)
        .with_context(|| format!("could not create temporary file `{}`", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), batch.schema(), Some(props))
        .context("creating ArrowWriter")?;
    writer.write(&batch).context("writing observation batch")?;
    writer.close().context("closing ArrowWriter")?;

    fs::rename(&tmp_path, final_path).with_context(|| {
        format!(
            "failed to rename `{}` to `{}`",
            tmp_path.display(),
            final_path.display()
        )
    })?;

    info!(rows = batch.num_rows(), "exported observation table");
    Ok(batch.num_rows())
}
