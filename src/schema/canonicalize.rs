//! Column-name canonicalization.

use arrow::record_batch::RecordBatch;
use log::{debug, info};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{PipelineError, Result};
use crate::utils::arrow::rename_columns;

/// Old name → new name, for the columns whose name changed
pub type RenameMap = Vec<(String, String)>;

/// Number of rename entries logged at info level
const LOGGED_RENAMES: usize = 5;

fn collapse_separators(name: &str, separator: char) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_was_sep = false;
    for c in name.chars() {
        let is_sep = c == separator;
        if !(is_sep && previous_was_sep) {
            out.push(c);
        }
        previous_was_sep = is_sep;
    }
    out
}

/// Canonical form of a single column name
///
/// Trims, turns whitespace runs into `separator`, collapses repeated
/// separators, strips accents and any other non-ASCII character, then
/// lowercases.
#[must_use]
pub fn canonical_name(name: &str, separator: char) -> String {
    let joined = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&separator.to_string());
    let collapsed = collapse_separators(&joined, separator);
    let ascii: String = collapsed
        .nfd()
        .filter(|c| !is_combining_mark(*c) && c.is_ascii())
        .collect();
    // Dropped characters can leave separators adjacent again
    collapse_separators(&ascii, separator).to_lowercase()
}

/// Rewrites column names into a single canonical vocabulary
#[derive(Debug, Clone)]
pub struct SchemaCanonicalizer {
    separator: char,
}

impl Default for SchemaCanonicalizer {
    fn default() -> Self {
        Self::new('_')
    }
}

impl SchemaCanonicalizer {
    /// Create a canonicalizer joining words with `separator`
    #[must_use]
    pub const fn new(separator: char) -> Self {
        Self { separator }
    }

    /// Canonical names for a list of names, suffixing collisions with `_N`
    ///
    /// A name with nothing left after canonicalization becomes `col_N`, N
    /// being its 1-based position.
    #[must_use]
    pub fn canonical_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            let mut base = canonical_name(name.as_ref(), self.separator);
            if base.trim_matches(self.separator).is_empty() {
                base = format!("col{}{}", self.separator, position + 1);
            }
            let mut candidate = base.clone();
            let mut n = 1;
            while out.contains(&candidate) {
                candidate = format!("{base}{}{n}", self.separator);
                n += 1;
            }
            out.push(candidate);
        }
        out
    }

    /// Rename every column of the batch to its canonical form
    ///
    /// # Errors
    /// `TypeMismatch` when the batch has no columns
    pub fn canonicalize(&self, batch: &RecordBatch) -> Result<(RecordBatch, RenameMap)> {
        if batch.num_columns() == 0 {
            return Err(PipelineError::TypeMismatch(
                "cannot canonicalize a batch without columns".to_string(),
            ));
        }

        let schema = batch.schema();
        let old_names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let new_names = self.canonical_names(&old_names);

        let renames: RenameMap = old_names
            .into_iter()
            .zip(new_names.iter().cloned())
            .filter(|(old, new)| old != new)
            .collect();

        if renames.is_empty() {
            info!("Column names already canonical");
        } else {
            info!("Renamed {} columns", renames.len());
            for (i, (old, new)) in renames.iter().enumerate() {
                if i < LOGGED_RENAMES {
                    info!("  '{old}' -> '{new}'");
                } else {
                    debug!("  '{old}' -> '{new}'");
                }
            }
        }

        Ok((rename_columns(batch, &new_names)?, renames))
    }
}
