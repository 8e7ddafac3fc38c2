//! Frequency-based detection of malformed city labels within a region.
//!
//! Labels are first rewritten through a correction dictionary, then counted.
//! Cities seen too rarely are treated as encoding damage or typos: their rows
//! are flagged and excluded from the clean subset.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, StringArray};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::RegionConfig;
use crate::error::Result;
use crate::utils::arrow::{filter_record_batch, string_column, with_column};

/// Number of suspicious cities listed in the log
const LOGGED_SUSPICIOUS: usize = 10;

/// Decides whether a city label is suspicious given its frequency
pub trait SuspicionStrategy: Debug + Send + Sync {
    /// Whether rows carrying `city`, seen `count` times, should be flagged
    fn is_suspicious(&self, city: &str, count: usize) -> bool;
}

/// Flags cities whose count is at or below a threshold
#[derive(Debug, Clone, Copy)]
pub struct FrequencyThreshold {
    /// Largest count still considered suspicious
    pub threshold: usize,
}

impl SuspicionStrategy for FrequencyThreshold {
    fn is_suspicious(&self, _city: &str, count: usize) -> bool {
        count <= self.threshold
    }
}

/// Clean distinct-city count compared against the known ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeilingCheck {
    /// At or below the ceiling
    WithinCeiling,
    /// Above the ceiling by at most the margin
    WithinMargin {
        /// Cities above the ceiling
        excess: usize,
    },
    /// Above the ceiling by more than the margin
    Exceeded {
        /// Cities above the ceiling
        excess: usize,
    },
}

impl CeilingCheck {
    /// Classify `count` against `ceiling` and `margin`
    #[must_use]
    pub const fn evaluate(count: usize, ceiling: usize, margin: usize) -> Self {
        if count <= ceiling {
            Self::WithinCeiling
        } else if count <= ceiling + margin {
            Self::WithinMargin {
                excess: count - ceiling,
            }
        } else {
            Self::Exceeded {
                excess: count - ceiling,
            }
        }
    }
}

/// Everything the detector derived from one region subset
#[derive(Debug, Clone)]
pub struct GeoOutlierReport {
    /// The region subset with corrected cities and the suspicion flag
    pub annotated: RecordBatch,
    /// Rows of `annotated` that are not suspicious
    pub clean: RecordBatch,
    /// Per-row suspicion flags, aligned with `annotated`
    pub suspicious: Vec<bool>,
    /// City counts after correction, most frequent first
    pub frequencies: Vec<(String, usize)>,
    /// Rows rewritten by the correction dictionary
    pub corrections_applied: usize,
    /// Cities judged suspicious, most frequent first
    pub suspicious_cities: Vec<String>,
    /// Distinct cities in the clean subset
    pub clean_city_count: usize,
    /// Outcome of the ceiling comparison
    pub ceiling: CeilingCheck,
}

/// Count non-null labels, most frequent first (ties by label)
#[must_use]
pub fn city_frequencies(cities: &StringArray) -> Vec<(String, usize)> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for city in cities.iter().flatten() {
        *counts.entry(city).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(city, count)| (city.to_string(), count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}

/// Corrects, counts and flags city labels
#[derive(Debug, Clone)]
pub struct GeoOutlierDetector {
    config: RegionConfig,
    strategy: Arc<dyn SuspicionStrategy>,
}

impl GeoOutlierDetector {
    /// Create a detector using the configured frequency threshold
    #[must_use]
    pub fn new(config: RegionConfig) -> Self {
        let strategy = Arc::new(FrequencyThreshold {
            threshold: config.low_frequency_threshold,
        });
        Self { config, strategy }
    }

    /// Create a detector with a custom suspicion strategy
    #[must_use]
    pub fn with_strategy(config: RegionConfig, strategy: Arc<dyn SuspicionStrategy>) -> Self {
        Self { config, strategy }
    }

    fn apply_corrections(&self, cities: &StringArray) -> (StringArray, usize) {
        let corrections: &BTreeMap<String, String> = &self.config.corrections;
        let mut per_pair: BTreeMap<&str, usize> = BTreeMap::new();

        let corrected: StringArray = cities
            .iter()
            .map(|city| {
                city.map(|c| match corrections.get_key_value(c) {
                    Some((wrong, right)) => {
                        *per_pair.entry(wrong.as_str()).or_insert(0) += 1;
                        right.as_str()
                    }
                    None => c,
                })
            })
            .collect();

        for (wrong, count) in &per_pair {
            info!("  '{wrong}' -> '{}': {count} rows", corrections[*wrong]);
        }
        let total = per_pair.values().sum();
        info!("Corrections applied: {total} rows");
        (corrected, total)
    }

    /// Run correction, counting, flagging and partitioning on a region subset
    ///
    /// A subset without the city column gets an all-false flag and is clean
    /// as a whole.
    pub fn detect(&self, region: &RecordBatch) -> Result<GeoOutlierReport> {
        let rows = region.num_rows();
        let flag_name = &self.config.suspicious_flag_column;

        let Some(raw_cities) = string_column(region, &self.config.city_column)? else {
            warn!(
                "City column '{}' not found; no rows flagged",
                self.config.city_column
            );
            let annotated = with_column(
                region,
                flag_name,
                Arc::new(BooleanArray::from(vec![false; rows])) as ArrayRef,
            )?;
            return Ok(GeoOutlierReport {
                clean: annotated.clone(),
                annotated,
                suspicious: vec![false; rows],
                frequencies: Vec::new(),
                corrections_applied: 0,
                suspicious_cities: Vec::new(),
                clean_city_count: 0,
                ceiling: CeilingCheck::WithinCeiling,
            });
        };

        let (cities, corrections_applied) = self.apply_corrections(&raw_cities);
        let frequencies = city_frequencies(&cities);
        let counts: FxHashMap<&str, usize> =
            frequencies.iter().map(|(c, n)| (c.as_str(), *n)).collect();

        let suspicious_cities: Vec<String> = frequencies
            .iter()
            .filter(|(city, count)| self.strategy.is_suspicious(city, *count))
            .map(|(city, _)| city.clone())
            .collect();

        let suspicious: Vec<bool> = cities
            .iter()
            .map(|city| {
                city.is_some_and(|c| {
                    counts
                        .get(c)
                        .is_some_and(|n| self.strategy.is_suspicious(c, *n))
                })
            })
            .collect();

        let flagged_rows = suspicious.iter().filter(|s| **s).count();
        info!("Suspicious cities: {}", suspicious_cities.len());
        info!("Suspicious rows: {flagged_rows}");
        for city in suspicious_cities.iter().rev().take(LOGGED_SUSPICIOUS) {
            info!("  '{city}': {} rows", counts.get(city.as_str()).copied().unwrap_or(0));
        }

        let mut annotated = with_column(region, &self.config.city_column, Arc::new(cities) as ArrayRef)?;
        annotated = with_column(
            &annotated,
            flag_name,
            Arc::new(BooleanArray::from(suspicious.clone())) as ArrayRef,
        )?;
        let keep: BooleanArray = suspicious.iter().map(|s| Some(!s)).collect();
        let clean = filter_record_batch(&annotated, &keep)?;

        let clean_city_count = frequencies.len() - suspicious_cities.len();
        let ceiling = CeilingCheck::evaluate(
            clean_city_count,
            self.config.expected_city_ceiling,
            self.config.ceiling_margin,
        );
        info!(
            "Cities: {} -> {clean_city_count}; rows: {rows} -> {}",
            frequencies.len(),
            clean.num_rows()
        );
        match ceiling {
            CeilingCheck::WithinCeiling => info!(
                "City count within the expected {}",
                self.config.expected_city_ceiling
            ),
            CeilingCheck::WithinMargin { excess } => {
                warn!("{excess} cities above the expected count (acceptable margin)");
            }
            CeilingCheck::Exceeded { excess } => {
                warn!("{excess} cities above the expected count; review the cleaning rules");
            }
        }

        Ok(GeoOutlierReport {
            annotated,
            clean,
            suspicious,
            frequencies,
            corrections_applied,
            suspicious_cities,
            clean_city_count,
            ceiling,
        })
    }
}
