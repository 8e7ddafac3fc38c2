//! Delimited-file loading utilities
//!
//! The loader sniffs the delimiter from the first line (unless one is
//! given), then walks the [`ReadStrategy::FALLBACK_CHAIN`] until one
//! strategy produces a batch.

pub mod delimiter;
pub mod parse;

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::error::Result;
use crate::error::util::{ensure_exists, try_operations};
use crate::utils::arrow::concat_with_union_schema;
use crate::utils::io::find_files;
use crate::utils::logging::{log_operation_complete, log_operation_start};

pub use delimiter::{detect_delimiter, detect_file_delimiter};
pub use parse::{ReadStrategy, parse_delimited};

/// Reads delimited tables into record batches
#[derive(Debug, Clone, Default)]
pub struct Loader {
    delimiter: Option<u8>,
}

impl Loader {
    /// Create a loader that detects the delimiter of every file
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: None }
    }

    /// Create a loader that always uses the given delimiter
    #[must_use]
    pub const fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    /// Load one file
    ///
    /// # Errors
    /// `NotFound` if the path does not exist, `ParseExhausted` when every
    /// read strategy fails
    pub fn load(&self, path: &Path) -> Result<RecordBatch> {
        ensure_exists(path)?;
        let start = Instant::now();
        log_operation_start("Loading", path);

        let delimiter = match self.delimiter {
            Some(d) => d,
            None => detect_file_delimiter(path)?,
        };
        info!("Delimiter: {:?}", char::from(delimiter));

        let bytes = std::fs::read(path)?;
        let attempts = ReadStrategy::FALLBACK_CHAIN
            .iter()
            .map(|&strategy| {
                let bytes = &bytes;
                (strategy.label(), move || parse_delimited(bytes, delimiter, strategy))
            })
            .collect();

        let (batch, skipped) = try_operations(path, attempts)?;
        if skipped > 0 {
            warn!("Skipped {skipped} malformed rows in {}", path.display());
        }

        log_operation_complete(
            "loaded",
            path,
            batch.num_rows(),
            batch.num_columns(),
            Some(start.elapsed()),
        );
        Ok(batch)
    }

    /// Load each file matching a glob pattern, keeping the per-file result
    ///
    /// # Errors
    /// `NotFound` when nothing matches the pattern
    pub fn load_each(&self, pattern: &str) -> Result<Vec<(PathBuf, Result<RecordBatch>)>> {
        let files = find_files(pattern)?;
        Ok(files
            .into_iter()
            .map(|path| {
                let result = self.load(&path);
                (path, result)
            })
            .collect())
    }

    /// Load every file matching a glob pattern into one batch
    ///
    /// Files are concatenated with a unified schema; any failing file fails
    /// the whole load.
    pub fn load_glob(&self, pattern: &str) -> Result<RecordBatch> {
        let batches = self
            .load_each(pattern)?
            .into_iter()
            .map(|(_, result)| result)
            .collect::<Result<Vec<_>>>()?;
        concat_with_union_schema(&batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::fs;

    #[test]
    fn test_missing_file_is_not_found() {
        let result = Loader::new().load(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }

    #[test]
    fn test_detects_semicolon_and_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "Nome Fantasia;UF\nAgibank;SP\nbroken;row;extra\nOutro;RJ\n").unwrap();

        let batch = Loader::new().load(&path).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 2);
    }

    #[test]
    fn test_falls_back_to_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        fs::write(&path, b"cidade;uf\nGuai\xe7ara;SP\n").unwrap();

        let batch = Loader::new().load(&path).unwrap();
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn test_load_glob_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x,y\n1,2\n").unwrap();
        fs::write(dir.path().join("b.csv"), "x;z\n3;4\n").unwrap();

        let pattern = format!("{}/*.csv", dir.path().display());
        let batch = Loader::new().load_glob(&pattern).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
    }
}
