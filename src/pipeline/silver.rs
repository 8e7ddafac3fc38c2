//! Silver stage: canonical names, parsed timestamps and categorical columns.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use log::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingest::deduplicate_source_rows;
use crate::loader::Loader;
use crate::schema::{
    ColumnConversion, LowCardinalityOptimizer, RenameMap, SchemaCanonicalizer,
    TemporalNormalizer, canonical_name,
};
use crate::utils::arrow::{bool_column, drop_columns};
use crate::utils::io::write_delimited;
use crate::utils::logging::log_stage_banner;

/// Summary of a silver run
#[derive(Debug, Clone)]
pub struct SilverReport {
    /// Rows read from the bronze output
    pub rows_in: usize,
    /// Rows written
    pub rows_out: usize,
    /// Columns written
    pub columns: usize,
    /// Columns removed by the drop list
    pub dropped_columns: Vec<String>,
    /// Column renames
    pub renames: RenameMap,
    /// Outcome per configured temporal column
    pub conversions: Vec<(String, ColumnConversion)>,
    /// Columns re-encoded as categorical
    pub categorical_columns: Vec<String>,
    /// Rows removed by the final dedup
    pub duplicates_removed: usize,
    /// Rows flagged as the target entity
    pub entity_rows: usize,
    /// Where the output was written
    pub output: Option<PathBuf>,
    /// Wall time of the run
    pub duration: Duration,
}

impl SilverReport {
    /// Log the final report
    pub fn log(&self) {
        log_stage_banner("SILVER REPORT");
        info!("Duration: {:?}", self.duration);
        info!("Rows: {} -> {}", self.rows_in, self.rows_out);
        info!("Columns: {}", self.columns);
        info!("Dropped columns: {}", self.dropped_columns.len());
        info!("Renamed columns: {}", self.renames.len());
        for (column, conversion) in &self.conversions {
            if let Some(stats) = conversion.stats() {
                info!("  {column}: {:.1}% parsed", stats.success_rate);
            }
        }
        info!("Categorical columns: {}", self.categorical_columns.len());
        info!("Target entity rows: {}", self.entity_rows);
        if let Some(output) = &self.output {
            info!("Output: {}", output.display());
        }
    }
}

/// Schema and type standardization of the bronze table
#[derive(Debug, Clone)]
pub struct SilverStage {
    config: PipelineConfig,
    canonicalizer: SchemaCanonicalizer,
    temporal: TemporalNormalizer,
    optimizer: LowCardinalityOptimizer,
}

impl SilverStage {
    /// Build the stage and its components from the configuration
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            canonicalizer: SchemaCanonicalizer::new(config.standardization.separator),
            temporal: TemporalNormalizer::new(config.temporal.clone()),
            optimizer: LowCardinalityOptimizer::new(config.cardinality.clone()),
            config: config.clone(),
        }
    }

    /// Remove drop-list columns, matched by raw or canonical name
    pub fn drop_low_value_columns(&self, batch: &RecordBatch) -> Result<(RecordBatch, Vec<String>)> {
        let separator = self.config.standardization.separator;
        let wanted: Vec<String> = self
            .config
            .standardization
            .drop_columns
            .iter()
            .map(|c| canonical_name(c, separator))
            .collect();

        let schema = batch.schema();
        let dropped: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| {
                self.config.standardization.drop_columns.contains(name)
                    || wanted.contains(&canonical_name(name, separator))
            })
            .collect();

        if !dropped.is_empty() {
            info!("Dropping {} columns: {dropped:?}", dropped.len());
        }
        let names: Vec<&str> = dropped.iter().map(String::as_str).collect();
        Ok((drop_columns(batch, &names)?, dropped))
    }

    /// Apply every silver transform to an in-memory batch
    ///
    /// # Errors
    /// `TypeMismatch` when the batch has no columns
    pub fn standardize(&self, batch: &RecordBatch) -> Result<(RecordBatch, SilverReport)> {
        let start = Instant::now();
        let rows_in = batch.num_rows();

        let (trimmed, dropped_columns) = self.drop_low_value_columns(batch)?;
        let (renamed, renames) = self.canonicalizer.canonicalize(&trimmed)?;
        let temporal = self.temporal.normalize(&renamed)?;
        let (optimized, categorical_columns) = self.optimizer.optimize(&temporal.batch)?;
        let deduped = deduplicate_source_rows(&optimized, "silver")?;

        let entity_rows = bool_column(&deduped.batch, &self.config.entity.flag_column)?
            .map_or(0, |flags| flags.into_iter().filter(|f| *f).count());

        let report = SilverReport {
            rows_in,
            rows_out: deduped.batch.num_rows(),
            columns: deduped.batch.num_columns(),
            dropped_columns,
            renames,
            conversions: temporal.conversions,
            categorical_columns,
            duplicates_removed: deduped.removed,
            entity_rows,
            output: None,
            duration: start.elapsed(),
        };
        Ok((deduped.batch, report))
    }

    /// Load the bronze output, standardize it and write the silver output
    ///
    /// # Errors
    /// `NotFound` when the bronze output is missing
    pub fn run(&self) -> Result<SilverReport> {
        let start = Instant::now();
        log_stage_banner("SILVER: standardization");

        let input = self.config.paths.bronze_output();
        let batch = Loader::new().load(&input)?;
        let (standardized, mut report) = self.standardize(&batch)?;

        let output = self.config.paths.silver_output();
        write_delimited(&output, &standardized, self.config.processing.output_delimiter)?;

        report.output = Some(output);
        report.duration = start.elapsed();
        report.log();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::schema::categorical_type;
    use crate::utils::arrow::build_batch;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, TimeUnit};
    use std::sync::Arc;

    fn text_batch(columns: &[(&str, Vec<&str>)]) -> RecordBatch {
        let rows = columns.first().map_or(0, |(_, v)| v.len());
        let fields = columns.iter().map(|(n, _)| Field::new(*n, DataType::Utf8, true)).collect();
        let arrays = columns
            .iter()
            .map(|(_, v)| Arc::new(StringArray::from(v.clone())) as ArrayRef)
            .collect();
        build_batch(fields, arrays, rows).unwrap()
    }

    #[test]
    fn test_standardize_pipeline() {
        let ufs: Vec<&str> = (0..200).map(|_| "SP").collect();
        let dates: Vec<&str> = (0..200)
            .map(|i| if (i / 2) % 2 == 0 { "01/02/2025" } else { "02/02/2025" })
            .collect();
        let ids: Vec<String> = (0..200).map(|i| (i / 2).to_string()).collect();
        let batch = text_batch(&[
            ("UF", ufs),
            ("Data Abertura", dates),
            ("Gestor", vec!["x"; 200]),
            ("Protocolo", ids.iter().map(String::as_str).collect()),
        ]);

        let (out, report) = SilverStage::new(&PipelineConfig::default())
            .standardize(&batch)
            .unwrap();

        assert_eq!(report.dropped_columns, vec!["Gestor".to_string()]);
        let schema = out.schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["uf", "data_abertura", "protocolo"]);
        assert_eq!(
            schema.field(1).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(schema.field(0).data_type(), &categorical_type());
        // Protocol ids repeat in pairs with the same date
        assert_eq!(report.duplicates_removed, 100);
        assert_eq!(out.num_rows(), 100);
    }

    #[test]
    fn test_missing_bronze_output_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.silver_dir = dir.path().to_path_buf();
        let result = SilverStage::new(&config).run();
        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }
}
