//! Bronze stage: raw export files into one annotated, deduplicated table.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use log::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingest::{
    DataSource, EntityMatcher, MetadataAnnotator, QualityGate, QualityIssue, deduplicate,
    deduplicate_source_rows,
};
use crate::loader::Loader;
use crate::utils::arrow::{bool_column, concat_with_union_schema};
use crate::utils::io::{find_files, write_delimited};
use crate::utils::logging::{
    create_file_progress_bar, finish_progress_bar, log_stage_banner, log_warning,
};

/// Number of column names shown by the structure exploration
const EXPLORED_COLUMNS: usize = 5;

/// What happened to one input file
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// The file went through the whole per-file pipeline
    Processed {
        /// File name
        file: String,
        /// Rows after loading
        rows_loaded: usize,
        /// Rows after per-file dedup
        rows_kept: usize,
        /// Quality issues found
        issues: Vec<QualityIssue>,
    },
    /// The file was skipped
    Failed {
        /// File name
        file: String,
        /// Error that stopped it
        reason: String,
    },
}

impl FileOutcome {
    /// Whether the file contributed rows
    #[must_use]
    pub const fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Summary of a bronze run
#[derive(Debug, Clone)]
pub struct BronzeReport {
    /// Per-file outcomes, in processing order
    pub files: Vec<FileOutcome>,
    /// Rows after concatenation, before corpus dedup
    pub rows_concatenated: usize,
    /// Rows removed by corpus dedup
    pub corpus_duplicates: usize,
    /// Rows in the bronze output
    pub rows: usize,
    /// Columns in the bronze output
    pub columns: usize,
    /// Rows flagged as the target entity
    pub entity_rows: usize,
    /// Every quality issue, across files
    pub issues: Vec<QualityIssue>,
    /// Where the output was written
    pub output: Option<PathBuf>,
    /// Wall time of the run
    pub duration: Duration,
}

impl BronzeReport {
    /// Number of files that were processed
    #[must_use]
    pub fn files_processed(&self) -> usize {
        self.files.iter().filter(|f| f.is_processed()).count()
    }

    /// Log the final report
    pub fn log(&self) {
        log_stage_banner("BRONZE REPORT");
        info!("Duration: {:?}", self.duration);
        info!("Files processed: {}/{}", self.files_processed(), self.files.len());
        info!("Rows: {} ({} corpus duplicates removed)", self.rows, self.corpus_duplicates);
        info!("Columns: {}", self.columns);
        info!("Target entity rows: {}", self.entity_rows);
        info!("Quality issues: {}", self.issues.len());
        if let Some(output) = &self.output {
            info!("Output: {}", output.display());
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Raw ingestion over a set of export files
#[derive(Debug, Clone)]
pub struct BronzeStage {
    config: PipelineConfig,
    loader: Loader,
    annotator: MetadataAnnotator,
    matcher: EntityMatcher,
    gate: QualityGate,
}

impl BronzeStage {
    /// Build the stage and its components from the configuration
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        let loader = match config.processing.input_delimiter {
            Some(d) => match u8::try_from(d) {
                Ok(byte) => Loader::with_delimiter(byte),
                Err(_) => {
                    warn!("Input delimiter {d:?} is not a single byte; detecting per file");
                    Loader::new()
                }
            },
            None => Loader::new(),
        };
        Self {
            loader,
            annotator: MetadataAnnotator::new(config.entity.flag_column.clone()),
            matcher: EntityMatcher::new(config.entity.clone()),
            gate: QualityGate::new(config.quality.clone()),
            config: config.clone(),
        }
    }

    /// Warn about every file whose name lacks the target year
    ///
    /// Returns the number of files warned about.
    pub fn validate_files(&self, files: &[PathBuf]) -> usize {
        let year = self.config.processing.target_year.to_string();
        info!("Files found: {}", files.len());
        let mut flagged = 0;
        for path in files {
            let name = file_name(path);
            if name.contains(&year) {
                info!("  {name}");
            } else {
                flagged += 1;
                log_warning(&format!("File name does not mention {year}"), Some(path));
            }
        }
        flagged
    }

    /// Log the shape of the first file
    ///
    /// A file that cannot be loaded only produces a warning here; it fails
    /// again, and is skipped, during processing.
    pub fn explore_structure(&self, path: &Path) {
        match self.loader.load(path) {
            Ok(batch) => {
                let schema = batch.schema();
                let names: Vec<&str> = schema
                    .fields()
                    .iter()
                    .take(EXPLORED_COLUMNS)
                    .map(|f| f.name().as_str())
                    .collect();
                info!(
                    "Structure of {}: {} columns, first: {names:?}",
                    file_name(path),
                    batch.num_columns()
                );
            }
            Err(e) => warn!("Could not explore {}: {e}", path.display()),
        }
    }

    /// Load, annotate, match, gate and deduplicate one file
    pub fn process_file(&self, path: &Path) -> Result<(RecordBatch, FileOutcome)> {
        let file = file_name(path);
        let loaded = self.loader.load(path)?;
        let rows_loaded = loaded.num_rows();

        let annotated = self.annotator.annotate(&loaded, path, DataSource::ConsumidorGov)?;
        let matched = self.matcher.flag(&annotated)?;
        let (scored, issues) = self.gate.evaluate(&matched, &file)?;
        let deduped = deduplicate(&scored, "file")?;

        let outcome = FileOutcome::Processed {
            file,
            rows_loaded,
            rows_kept: deduped.batch.num_rows(),
            issues,
        };
        Ok((deduped.batch, outcome))
    }

    /// Process every file and combine the survivors
    ///
    /// # Errors
    /// `NoFilesProcessed` when every file failed
    pub fn ingest(&self, files: &[PathBuf]) -> Result<(RecordBatch, BronzeReport)> {
        let start = Instant::now();
        if files.is_empty() {
            return Err(PipelineError::NoFilesProcessed { attempted: 0 });
        }

        let pb = create_file_progress_bar(files.len() as u64, Some("ingesting"));
        let mut batches = Vec::with_capacity(files.len());
        let mut outcomes = Vec::with_capacity(files.len());
        for path in files {
            pb.set_message(file_name(path));
            match self.process_file(path) {
                Ok((batch, outcome)) => {
                    batches.push(batch);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    if e.is_structural() {
                        error!("Failed to process {}: {e}", path.display());
                    } else {
                        warn!("Skipping {}: {e}", path.display());
                    }
                    outcomes.push(FileOutcome::Failed {
                        file: file_name(path),
                        reason: e.to_string(),
                    });
                }
            }
            pb.inc(1);
        }
        finish_progress_bar(&pb, Some("files ingested"));

        if batches.is_empty() {
            return Err(PipelineError::NoFilesProcessed {
                attempted: files.len(),
            });
        }

        let combined = concat_with_union_schema(&batches)?;
        let rows_concatenated = combined.num_rows();
        info!("Combined {} files into {rows_concatenated} rows", batches.len());
        let deduped = deduplicate_source_rows(&combined, "corpus")?;

        let entity_rows = bool_column(&deduped.batch, &self.config.entity.flag_column)?
            .map_or(0, |flags| flags.into_iter().filter(|f| *f).count());
        let issues = outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Processed { issues, .. } => Some(issues.clone()),
                FileOutcome::Failed { .. } => None,
            })
            .flatten()
            .collect();

        let report = BronzeReport {
            files: outcomes,
            rows_concatenated,
            corpus_duplicates: deduped.removed,
            rows: deduped.batch.num_rows(),
            columns: deduped.batch.num_columns(),
            entity_rows,
            issues,
            output: None,
            duration: start.elapsed(),
        };
        Ok((deduped.batch, report))
    }

    /// Run the stage end to end and write the bronze output
    ///
    /// # Errors
    /// `NotFound` when no file matches the raw glob, `NoFilesProcessed`
    /// when none survives
    pub fn run(&self) -> Result<BronzeReport> {
        let start = Instant::now();
        log_stage_banner("BRONZE: raw ingestion");

        let files = find_files(&self.config.paths.raw_glob)?;
        self.validate_files(&files);
        if let Some(first) = files.first() {
            self.explore_structure(first);
        }

        let (batch, mut report) = self.ingest(&files)?;
        let output = self.config.paths.bronze_output();
        write_delimited(&output, &batch, self.config.processing.output_delimiter)?;

        report.output = Some(output);
        report.duration = start.elapsed();
        report.log();
        Ok(report)
    }
}
