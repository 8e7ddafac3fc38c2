//! Error handling for the complaint pipeline.
//!
//! Structural failures (missing input, unreadable format, wrong data shape)
//! are represented here and propagate out of a stage. Advisory problems such
//! as null density or unparseable dates are never errors; they are logged and
//! folded into stage reports instead.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;

/// Specialized error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required input path does not exist
    #[error("Not found: {}", path.display())]
    NotFound {
        /// The missing path (or glob pattern)
        path: PathBuf,
    },

    /// Every read strategy of the loader failed
    #[error("All {attempts} read attempts failed for {}. Last error: {last_cause}", path.display())]
    ParseExhausted {
        /// The file being read
        path: PathBuf,
        /// Number of strategies tried
        attempts: usize,
        /// Description of the last underlying failure
        last_cause: String,
    },

    /// A transform received input that is not a usable table
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// No file survived the per-file ingestion pipeline
    #[error("No files were processed successfully ({attempted} attempted)")]
    NoFilesProcessed {
        /// Number of files that were attempted
        attempted: usize,
    },

    /// Error with schema compatibility or column layout
    #[error("Schema error: {0}")]
    Schema(String),

    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Delimited-text reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration document error
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl PipelineError {
    /// Create a not-found error for a path
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Whether this error aborts the whole run rather than a single file
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::ParseExhausted { .. }
                | Self::TypeMismatch(_)
                | Self::NoFilesProcessed { .. }
        )
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
