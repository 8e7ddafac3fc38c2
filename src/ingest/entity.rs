//! Target-entity matching over a free-text company column.

use std::fmt::Debug;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::config::EntityConfig;
use crate::error::Result;
use crate::utils::arrow::{bool_column, find_first_column, string_column, with_column};

/// Decides whether a company name belongs to the target entity
pub trait EntityMatchStrategy: Debug + Send + Sync {
    /// Whether `company` refers to the target entity
    fn is_match(&self, company: &str) -> bool;
}

/// Case-insensitive substring match against any alias
#[derive(Debug, Clone)]
pub struct AliasSubstringMatcher {
    lowered_aliases: Vec<String>,
}

impl AliasSubstringMatcher {
    /// Create a matcher for the given aliases
    #[must_use]
    pub fn new(aliases: &[String]) -> Self {
        Self {
            lowered_aliases: aliases
                .iter()
                .filter(|a| !a.trim().is_empty())
                .map(|a| a.to_lowercase())
                .collect(),
        }
    }
}

impl EntityMatchStrategy for AliasSubstringMatcher {
    fn is_match(&self, company: &str) -> bool {
        let lowered = company.to_lowercase();
        self.lowered_aliases
            .iter()
            .any(|alias| lowered.contains(alias.as_str()))
    }
}

/// Sets the target-entity flag on every row whose company column matches
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    config: EntityConfig,
    strategy: Arc<dyn EntityMatchStrategy>,
}

impl EntityMatcher {
    /// Create a matcher using alias-substring matching
    #[must_use]
    pub fn new(config: EntityConfig) -> Self {
        let strategy = Arc::new(AliasSubstringMatcher::new(&config.aliases));
        Self { config, strategy }
    }

    /// Create a matcher with a custom strategy
    #[must_use]
    pub fn with_strategy(config: EntityConfig, strategy: Arc<dyn EntityMatchStrategy>) -> Self {
        Self { config, strategy }
    }

    /// Name of the flag column this matcher writes
    #[must_use]
    pub fn flag_column(&self) -> &str {
        &self.config.flag_column
    }

    /// Flag matching rows
    ///
    /// Flags already set stay set. When no candidate company column exists
    /// the batch keeps an all-false flag and a warning is logged.
    pub fn flag(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let rows = batch.num_rows();
        let mut flags =
            bool_column(batch, &self.config.flag_column)?.unwrap_or_else(|| vec![false; rows]);

        let Some(column) = find_first_column(batch, &self.config.company_columns) else {
            warn!(
                "No company column found (tried {:?}); '{}' left false",
                self.config.company_columns, self.config.flag_column
            );
            return self.write_flags(batch, flags);
        };

        let Some(companies) = string_column(batch, column)? else {
            return self.write_flags(batch, flags);
        };
        for (i, flag) in flags.iter_mut().enumerate() {
            if companies.is_valid(i) && self.strategy.is_match(companies.value(i)) {
                *flag = true;
            }
        }

        let hits = flags.iter().filter(|f| **f).count();
        let pct = if rows == 0 {
            0.0
        } else {
            hits as f64 / rows as f64 * 100.0
        };
        info!("Target entity records in '{column}': {hits} ({pct:.2}%)");

        self.write_flags(batch, flags)
    }

    fn write_flags(&self, batch: &RecordBatch, flags: Vec<bool>) -> Result<RecordBatch> {
        with_column(
            batch,
            &self.config.flag_column,
            Arc::new(BooleanArray::from(flags)) as ArrayRef,
        )
    }
}
