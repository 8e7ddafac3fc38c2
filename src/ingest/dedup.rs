//! Exact full-row duplicate removal.

use arrow::array::{ArrayRef, BooleanArray};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use log::info;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::ingest::metadata::PROVENANCE_COLUMNS;
use crate::ingest::quality::QUALITY_SCORE_COLUMN;
use crate::utils::arrow::filter_record_batch;

/// Result of a deduplication pass
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// The batch with later duplicates removed
    pub batch: RecordBatch,
    /// Number of rows removed
    pub removed: usize,
}

/// Build a mask keeping the first occurrence of every distinct row
///
/// Columns named in `exclude` take no part in the comparison.
fn first_occurrence_mask(batch: &RecordBatch, exclude: &[&str]) -> Result<BooleanArray> {
    let rows = batch.num_rows();
    let schema = batch.schema();
    let (fields, columns): (Vec<SortField>, Vec<ArrayRef>) = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(field, _)| !exclude.contains(&field.name().as_str()))
        .map(|(field, column)| (SortField::new(field.data_type().clone()), column.clone()))
        .unzip();

    if columns.is_empty() {
        // Rows without key columns are all identical
        return Ok((0..rows).map(|i| Some(i == 0)).collect());
    }

    let converter = RowConverter::new(fields)?;
    let encoded = converter.convert_columns(&columns)?;

    let mut seen = FxHashSet::default();
    Ok((0..rows)
        .map(|i| Some(seen.insert(encoded.row(i))))
        .collect())
}

/// Count rows that repeat an earlier row exactly
pub fn count_duplicates(batch: &RecordBatch) -> Result<usize> {
    let mask = first_occurrence_mask(batch, &[])?;
    Ok(batch.num_rows() - mask.true_count())
}

/// Remove exact duplicate rows, keeping the first occurrence in order
///
/// `scope` names the pass in the log ("file", "corpus", ...).
pub fn deduplicate(batch: &RecordBatch, scope: &str) -> Result<DedupOutcome> {
    deduplicate_on(batch, &[], scope)
}

/// Remove rows equal to an earlier row on every column outside `exclude`
pub fn deduplicate_on(batch: &RecordBatch, exclude: &[&str], scope: &str) -> Result<DedupOutcome> {
    let mask = first_occurrence_mask(batch, exclude)?;
    let removed = batch.num_rows() - mask.true_count();
    if removed == 0 {
        info!("No duplicates found ({scope})");
        return Ok(DedupOutcome {
            batch: batch.clone(),
            removed,
        });
    }

    let deduped = filter_record_batch(batch, &mask)?;
    info!("Removed {removed} duplicate rows ({scope})");
    Ok(DedupOutcome {
        batch: deduped,
        removed,
    })
}

/// Remove rows repeating an earlier row on its source columns
///
/// Provenance columns and the quality score differ between files, so the
/// same complaint exported twice is only caught without them.
pub fn deduplicate_source_rows(batch: &RecordBatch, scope: &str) -> Result<DedupOutcome> {
    let exclude: Vec<&str> = PROVENANCE_COLUMNS
        .iter()
        .copied()
        .chain([QUALITY_SCORE_COLUMN])
        .collect();
    deduplicate_on(batch, &exclude, scope)
}
