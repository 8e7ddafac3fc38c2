//! A batch pipeline cleaning consumer-complaint exports in three stages:
//! bronze ingestion, silver standardization and gold curation.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod utils;

// Re-export the most common types for easier use
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use loader::Loader;
pub use pipeline::{BronzeStage, GoldStage, PipelineReport, SilverStage, run_all};

// Arrow types
pub use arrow::record_batch::RecordBatch;
