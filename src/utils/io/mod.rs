//! IO utilities for file operations
//!
//! This module provides utilities for discovering input files, naming
//! versioned stage outputs and writing delimited tables.

pub mod delimited;

// Re-export commonly used functions for convenience
pub use delimited::{OUTPUT_TIMESTAMP_FORMAT, find_files, versioned_path, write_delimited};
