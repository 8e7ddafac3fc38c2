//! Bronze-stage ingestion components
//!
//! Per-file processing runs annotate, match, gate, then dedup; the
//! concatenated corpus is deduplicated once more by the bronze stage.

pub mod dedup;
pub mod entity;
pub mod metadata;
pub mod quality;

pub use dedup::{
    DedupOutcome, count_duplicates, deduplicate, deduplicate_on, deduplicate_source_rows,
};
pub use entity::{AliasSubstringMatcher, EntityMatchStrategy, EntityMatcher};
pub use metadata::{
    DataSource, MetadataAnnotator, PROVENANCE_COLUMNS, UNKNOWN_FILE_MONTH, extract_file_month,
};
pub use quality::{QUALITY_SCORE_COLUMN, QualityGate, QualityIssue, quality_score};
