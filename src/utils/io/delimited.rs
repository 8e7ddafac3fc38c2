//! Delimited-text file operations
//!
//! Stage outputs are written through Arrow's CSV writer. Dictionary columns
//! are decoded first so the file carries plain labels.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::ArrayRef;
use arrow::compute::kernels::cast;
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;

use crate::error::{PipelineError, Result};
use crate::utils::arrow::build_batch;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Timestamp layout written into every stage output
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Build `<dir>/<stem>_v<version>.csv`
#[must_use]
pub fn versioned_path(dir: &Path, stem: &str, version: u32) -> PathBuf {
    dir.join(format!("{stem}_v{version}.csv"))
}

/// Find all files matching a glob pattern, sorted by path
///
/// # Errors
/// Returns a not-found error when nothing matches
pub fn find_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let files: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
        .sorted()
        .collect();

    if files.is_empty() {
        return Err(PipelineError::not_found(pattern));
    }
    Ok(files)
}

/// Write a batch as a delimited text file with a header row
///
/// Parent directories are created as needed. Nulls are written as empty
/// fields and timestamps use [`OUTPUT_TIMESTAMP_FORMAT`].
pub fn write_delimited(path: &Path, batch: &RecordBatch, delimiter: char) -> Result<()> {
    let start = Instant::now();
    log_operation_start("Writing", path);

    let delimiter = u8::try_from(delimiter).map_err(|_| {
        PipelineError::Schema(format!("Output delimiter {delimiter:?} is not a single byte"))
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let plain = decode_dictionaries(batch)?;
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(delimiter)
        .with_timestamp_format(OUTPUT_TIMESTAMP_FORMAT.to_string())
        .build(file);

    if plain.num_columns() > 0 {
        writer.write(&plain)?;
    }

    log_operation_complete("wrote", path, plain.num_rows(), plain.num_columns(), Some(start.elapsed()));
    Ok(())
}

fn decode_dictionaries(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if let DataType::Dictionary(_, value_type) = field.data_type() {
            columns.push(cast::cast(column, value_type)?);
            fields.push(Field::new(field.name(), value_type.as_ref().clone(), true));
        } else {
            columns.push(column.clone());
            fields.push(field.as_ref().clone());
        }
    }

    build_batch(fields, columns, batch.num_rows())
}
