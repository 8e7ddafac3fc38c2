//! Progress reporting utilities for multi-file operations
//!
//! Bars draw to stderr and hide themselves when it is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};

/// Default style for a per-file progress bar
pub const DEFAULT_FILE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files {msg}";

/// Create a progress bar that advances once per input file
///
/// # Arguments
/// * `length` - Number of files
/// * `description` - Optional description to display as the initial message
#[must_use]
pub fn create_file_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    let style = ProgressStyle::default_bar()
        .template(DEFAULT_FILE_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Finish a progress bar with a completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
