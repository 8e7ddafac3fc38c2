//! Delimiter detection from a file's first line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::error::util::ensure_exists;

/// Delimiters considered during detection, in tie-break order
pub const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Delimiter used when detection is inconclusive
pub const DEFAULT_DELIMITER: u8 = b',';

/// Pick the delimiter occurring most often in `line`
///
/// Ties between the top candidates and lines without any candidate fall
/// back to [`DEFAULT_DELIMITER`].
#[must_use]
pub fn detect_delimiter(line: &[u8]) -> u8 {
    let counts = CANDIDATE_DELIMITERS.map(|d| line.iter().filter(|&&b| b == d).count());
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return DEFAULT_DELIMITER;
    }

    let mut leaders = CANDIDATE_DELIMITERS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count == max)
        .map(|(d, _)| *d);

    match (leaders.next(), leaders.next()) {
        (Some(delimiter), None) => delimiter,
        _ => DEFAULT_DELIMITER,
    }
}

/// Read only the first line of `path` and detect its delimiter
pub fn detect_file_delimiter(path: &Path) -> Result<u8> {
    ensure_exists(path)?;
    let mut reader = BufReader::new(File::open(path)?);
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line)?;
    Ok(detect_delimiter(&first_line))
}
