//! Logging utilities for output and progress tracking
//!
//! This module provides utilities for consistent operation logging and
//! progress bars over multi-file work.

pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use log::{log_operation_complete, log_operation_start, log_stage_banner, log_warning};
pub use progress::{create_file_progress_bar, finish_progress_bar};
