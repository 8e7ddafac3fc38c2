//! Utility functions for error handling
//!
//! This module provides utility functions to make error handling more convenient.

use std::path::Path;

use log::{info, warn};

use crate::error::{PipelineError, Result};

/// Fail with a not-found error unless `path` exists
pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::not_found(path))
    }
}

/// Try multiple operations in sequence, returning the first success
///
/// Each operation is labelled for the diagnostic log. If every operation
/// fails, the returned `ParseExhausted` error names `path`, the number of
/// attempts and the last underlying cause.
///
/// # Example
/// ```
/// use complaint_medallion::error::util::try_operations;
/// use complaint_medallion::error::{PipelineError, Result};
/// use std::path::Path;
///
/// type Op = Box<dyn FnOnce() -> Result<u32>>;
/// let ops = vec![
///     ("first", Box::new(|| Err(PipelineError::Schema("nope".into()))) as Op),
///     ("second", Box::new(|| Ok(7u32)) as Op),
/// ];
/// assert_eq!(try_operations(Path::new("a.csv"), ops).unwrap(), 7);
/// ```
pub fn try_operations<T, F>(path: &Path, operations: Vec<(&str, F)>) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let attempts = operations.len();
    let mut last_cause = String::from("no read strategy configured");

    for (i, (label, operation)) in operations.into_iter().enumerate() {
        info!("Attempt {} ({label}) for {}", i + 1, path.display());
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("Attempt {} ({label}) failed: {e}", i + 1);
                last_cause = e.to_string();
            }
        }
    }

    Err(PipelineError::ParseExhausted {
        path: path.to_path_buf(),
        attempts,
        last_cause,
    })
}
