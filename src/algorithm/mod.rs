//! Gold-stage algorithms
//!
//! City-label outlier detection within a region and the grouped summaries
//! derived from the curated rows.

pub mod aggregate;
pub mod geo_outlier;

pub use aggregate::{Aggregator, GroupSummary, SummaryTable, round2};
pub use geo_outlier::{
    CeilingCheck, FrequencyThreshold, GeoOutlierDetector, GeoOutlierReport, SuspicionStrategy,
    city_frequencies,
};
