//! Per-file quality gate.
//!
//! Three checks are evaluated independently: minimum row count, null
//! density per column and exact duplicate rows. Each failed check becomes a
//! [`QualityIssue`]; issues lower the row-level `quality_score` but never
//! abort ingestion.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::config::QualityThresholds;
use crate::error::Result;
use crate::ingest::dedup::count_duplicates;
use crate::utils::arrow::with_column;

/// Name of the row-level score column
pub const QUALITY_SCORE_COLUMN: &str = "quality_score";

/// One advisory finding about an input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityIssue {
    /// File name the issue was found in
    pub file: String,
    /// Human-readable description
    pub description: String,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.description)
    }
}

/// Score for a file with `issue_count` issues
#[must_use]
pub fn quality_score(issue_count: usize) -> f64 {
    (1.0 - 0.1 * issue_count as f64).max(0.0)
}

/// Evaluates per-file quality thresholds
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    /// Create a gate with the given thresholds
    #[must_use]
    pub const fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Collect the issues of one file without touching the batch
    pub fn inspect(&self, batch: &RecordBatch, file: &str) -> Result<Vec<QualityIssue>> {
        let mut issues = Vec::new();
        let rows = batch.num_rows();

        if rows < self.thresholds.min_row_count {
            issues.push(QualityIssue {
                file: file.to_string(),
                description: format!(
                    "Too few rows: {rows} (minimum {})",
                    self.thresholds.min_row_count
                ),
            });
        }

        if rows > 0 {
            let dense: Vec<String> = batch
                .schema()
                .fields()
                .iter()
                .zip(batch.columns())
                .filter(|(_, column)| {
                    column.null_count() as f64 / rows as f64 > self.thresholds.max_null_fraction
                })
                .map(|(field, _)| field.name().clone())
                .collect();
            if !dense.is_empty() {
                issues.push(QualityIssue {
                    file: file.to_string(),
                    description: format!(
                        "Columns above {:.0}% nulls: {}",
                        self.thresholds.max_null_fraction * 100.0,
                        dense.join(", ")
                    ),
                });
            }
        }

        let duplicates = count_duplicates(batch)?;
        if duplicates > 0 {
            issues.push(QualityIssue {
                file: file.to_string(),
                description: format!("{duplicates} duplicate rows"),
            });
        }

        Ok(issues)
    }

    /// Run every check and attach the resulting score as a column
    ///
    /// Returns the scored batch and the issues found.
    pub fn evaluate(&self, batch: &RecordBatch, file: &str) -> Result<(RecordBatch, Vec<QualityIssue>)> {
        let issues = self.inspect(batch, file)?;
        if issues.is_empty() {
            info!("All quality checks passed for {file}");
        } else {
            for issue in &issues {
                warn!("Quality issue in {issue}");
            }
        }

        let score = quality_score(issues.len());
        let scored = with_column(
            batch,
            QUALITY_SCORE_COLUMN,
            Arc::new(Float64Array::from(vec![score; batch.num_rows()])) as ArrayRef,
        )?;
        Ok((scored, issues))
    }
}
