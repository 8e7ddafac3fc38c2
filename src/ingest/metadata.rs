//! Provenance columns attached to every ingested row.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use arrow::array::{ArrayRef, BooleanArray, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::Local;
use regex::Regex;

use crate::error::{PipelineError, Result};
use crate::utils::arrow::{has_column, with_column};

/// Sentinel written to `file_month` when the file name carries no period
pub const UNKNOWN_FILE_MONTH: &str = "Unknown";

/// Columns recording where and when a row was ingested
pub const PROVENANCE_COLUMNS: [&str; 4] = ["data_source", "file_origin", "processed_at", "file_month"];

/// Origin of an ingested file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Consumidor.gov.br monthly exports (the primary source)
    ConsumidorGov,
    /// SINDEC/Procon records
    Sindec,
}

impl DataSource {
    /// Identifier stored in the `data_source` column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConsumidorGov => "consumidor_gov",
            Self::Sindec => "sindec",
        }
    }

    /// Whether rows of this source carry a `file_month` column
    #[must_use]
    pub const fn has_file_month(&self) -> bool {
        matches!(self, Self::ConsumidorGov)
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn period_regex() -> &'static Regex {
    static PERIOD_RE: OnceLock<Regex> = OnceLock::new();
    PERIOD_RE.get_or_init(|| {
        Regex::new(r"(?P<year>(?:19|20)\d{2})-?(?P<month>0[1-9]|1[0-2])")
            .expect("valid file period regex")
    })
}

/// Extract `"MM/YYYY"` from a file name carrying a `YYYY-MM` or `YYYYMM` token
///
/// Returns [`UNKNOWN_FILE_MONTH`] when no token is found.
#[must_use]
pub fn extract_file_month(file_name: &str) -> String {
    period_regex()
        .captures(file_name)
        .map_or_else(
            || UNKNOWN_FILE_MONTH.to_string(),
            |caps| format!("{}/{}", &caps["month"], &caps["year"]),
        )
}

/// Attaches provenance columns to a freshly loaded batch
#[derive(Debug, Clone)]
pub struct MetadataAnnotator {
    flag_column: String,
}

impl Default for MetadataAnnotator {
    fn default() -> Self {
        Self::new("is_agibank")
    }
}

impl MetadataAnnotator {
    /// Create an annotator whose match flag column has the given name
    #[must_use]
    pub fn new(flag_column: impl Into<String>) -> Self {
        Self {
            flag_column: flag_column.into(),
        }
    }

    /// Add `data_source`, `file_origin`, `processed_at`, the match flag and,
    /// for the primary source, `file_month`
    ///
    /// # Errors
    /// `Schema` if the batch already carries one of the provenance columns
    pub fn annotate(&self, batch: &RecordBatch, path: &Path, source: DataSource) -> Result<RecordBatch> {
        let mut names = PROVENANCE_COLUMNS.to_vec();
        names.push(self.flag_column.as_str());
        if let Some(existing) = names.iter().find(|name| has_column(batch, name)) {
            return Err(PipelineError::Schema(format!(
                "Provenance column '{existing}' already present in {}",
                path.display()
            )));
        }

        let rows = batch.num_rows();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = Local::now().naive_local().and_utc().timestamp_micros();

        let mut annotated = with_column(
            batch,
            "data_source",
            Arc::new(StringArray::from(vec![source.as_str(); rows])) as ArrayRef,
        )?;
        annotated = with_column(
            &annotated,
            "file_origin",
            Arc::new(StringArray::from(vec![file_name.as_str(); rows])) as ArrayRef,
        )?;
        annotated = with_column(
            &annotated,
            "processed_at",
            Arc::new(TimestampMicrosecondArray::from(vec![now; rows])) as ArrayRef,
        )?;
        annotated = with_column(
            &annotated,
            &self.flag_column,
            Arc::new(BooleanArray::from(vec![false; rows])) as ArrayRef,
        )?;

        if source.has_file_month() {
            let month = extract_file_month(&file_name);
            annotated = with_column(
                &annotated,
                "file_month",
                Arc::new(StringArray::from(vec![month.as_str(); rows])) as ArrayRef,
            )?;
        }

        Ok(annotated)
    }
}
