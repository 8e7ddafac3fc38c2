//! Grouped complaint summaries with derived rates.
//!
//! Every table groups the curated rows by one key column and reports the
//! total, the target-entity share and, when the source columns exist, the
//! response rate, mean response time and resolution rate.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::SectorConfig;
use crate::error::Result;
use crate::utils::arrow::{
    bool_column, build_batch, filter_record_batch, has_column, numeric_column, string_column,
};

/// Round to two decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

#[derive(Debug, Default, Clone)]
struct GroupAccumulator {
    total: usize,
    entity: usize,
    responded: usize,
    resolved: usize,
    time_sum: f64,
    time_count: usize,
}

/// One row of a summary table
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// Grouping key
    pub key: String,
    /// Complaints in the group
    pub total: usize,
    /// Target-entity complaints in the group
    pub entity: usize,
    /// Target-entity share of the group, in percent
    pub percent_entity: f64,
    /// Group share of all grouped complaints, in percent
    pub percent_total: f64,
    /// Share answered by the company, in percent
    pub response_rate: Option<f64>,
    /// Mean response time in days
    pub mean_response_time: Option<f64>,
    /// Share evaluated as resolved, in percent
    pub resolution_rate: Option<f64>,
}

/// A grouped summary, sorted by total descending then key ascending
#[derive(Debug, Clone)]
pub struct SummaryTable {
    /// Name of the key column
    pub key_column: String,
    /// Rows in output order
    pub groups: Vec<GroupSummary>,
    has_response: bool,
    has_response_time: bool,
    has_resolution: bool,
}

impl SummaryTable {
    /// Number of groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the table has no groups
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 1-based rank of every key, in output order
    #[must_use]
    pub fn ranks(&self) -> FxHashMap<&str, i64> {
        self.groups
            .iter()
            .zip(1_i64..)
            .map(|(group, rank)| (group.key.as_str(), rank))
            .collect()
    }

    /// Render the table as a record batch
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new(&self.key_column, DataType::Utf8, true),
            Field::new("total_reclamacoes", DataType::Int64, false),
            Field::new("reclamacoes_agibank", DataType::Int64, false),
            Field::new("percentual_agibank", DataType::Float64, false),
            Field::new("percentual_total", DataType::Float64, false),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(self.groups.iter().map(|g| g.key.as_str()))),
            Arc::new(Int64Array::from_iter_values(self.groups.iter().map(|g| g.total as i64))),
            Arc::new(Int64Array::from_iter_values(self.groups.iter().map(|g| g.entity as i64))),
            Arc::new(Float64Array::from_iter_values(self.groups.iter().map(|g| g.percent_entity))),
            Arc::new(Float64Array::from_iter_values(self.groups.iter().map(|g| g.percent_total))),
        ];

        let optional: [(bool, &str, fn(&GroupSummary) -> Option<f64>); 3] = [
            (self.has_response, "taxa_resposta_pct", |g| g.response_rate),
            (self.has_response_time, "tempo_medio_resposta", |g| g.mean_response_time),
            (self.has_resolution, "taxa_resolucao_pct", |g| g.resolution_rate),
        ];
        for (present, name, value) in optional {
            if present {
                fields.push(Field::new(name, DataType::Float64, true));
                columns.push(Arc::new(self.groups.iter().map(value).collect::<Float64Array>()));
            }
        }

        build_batch(fields, columns, self.groups.len())
    }

    /// Log the largest groups
    pub fn log_top(&self, n: usize) {
        for group in self.groups.iter().take(n) {
            info!(
                "  {}: {} complaints ({}%)",
                group.key, group.total, group.percent_total
            );
        }
    }
}

/// Builds grouped summaries over curated rows
#[derive(Debug, Clone)]
pub struct Aggregator {
    sectors: SectorConfig,
    flag_column: String,
}

impl Aggregator {
    /// Create an aggregator reading the target-entity flag from `flag_column`
    #[must_use]
    pub fn new(sectors: SectorConfig, flag_column: impl Into<String>) -> Self {
        Self {
            sectors,
            flag_column: flag_column.into(),
        }
    }

    /// Summarize `batch` grouped by `key_column`
    ///
    /// Returns `None`, after a warning, when the key column is absent. Null
    /// keys are dropped.
    pub fn summarize(&self, batch: &RecordBatch, key_column: &str) -> Result<Option<SummaryTable>> {
        let Some(keys) = string_column(batch, key_column)? else {
            warn!("Grouping column '{key_column}' not found, skipping");
            return Ok(None);
        };

        let rows = batch.num_rows();
        let entity = bool_column(batch, &self.flag_column)?.unwrap_or_else(|| vec![false; rows]);
        let responses = string_column(batch, &self.sectors.response_column)?;
        let evaluations = string_column(batch, &self.sectors.evaluation_column)?;
        let times = numeric_column(batch, &self.sectors.response_time_column)?;

        let mut groups: FxHashMap<&str, GroupAccumulator> = FxHashMap::default();
        for (i, key) in keys.iter().enumerate() {
            let Some(key) = key else { continue };
            let acc = groups.entry(key).or_default();
            acc.total += 1;
            if entity[i] {
                acc.entity += 1;
            }
            if let Some(responses) = &responses {
                if responses.is_valid(i) && responses.value(i).trim() == self.sectors.response_yes {
                    acc.responded += 1;
                }
            }
            if let Some(evaluations) = &evaluations {
                if evaluations.is_valid(i)
                    && evaluations.value(i).trim() == self.sectors.resolved_value
                {
                    acc.resolved += 1;
                }
            }
            if let Some(value) = times.as_ref().and_then(|t| t[i]) {
                acc.time_sum += value;
                acc.time_count += 1;
            }
        }

        let grand_total: usize = groups.values().map(|a| a.total).sum();
        let mut summaries: Vec<GroupSummary> = groups
            .into_iter()
            .map(|(key, acc)| GroupSummary {
                key: key.to_string(),
                total: acc.total,
                entity: acc.entity,
                percent_entity: percent(acc.entity, acc.total),
                percent_total: percent(acc.total, grand_total),
                response_rate: responses.as_ref().map(|_| percent(acc.responded, acc.total)),
                mean_response_time: (acc.time_count > 0)
                    .then(|| round2(acc.time_sum / acc.time_count as f64)),
                resolution_rate: evaluations.as_ref().map(|_| percent(acc.resolved, acc.total)),
            })
            .collect();
        summaries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));

        info!("'{key_column}': {} groups", summaries.len());
        Ok(Some(SummaryTable {
            key_column: key_column.to_string(),
            groups: summaries,
            has_response: responses.is_some(),
            has_response_time: times.is_some(),
            has_resolution: evaluations.is_some(),
        }))
    }

    /// Count target-entity rows per key
    ///
    /// The resulting batch has the key column and `reclamacoes_agibank`.
    pub fn entity_counts(&self, batch: &RecordBatch, key_column: &str) -> Result<Option<RecordBatch>> {
        if !has_column(batch, key_column) {
            warn!("Grouping column '{key_column}' not found, skipping");
            return Ok(None);
        }
        let rows = batch.num_rows();
        let flags = bool_column(batch, &self.flag_column)?.unwrap_or_else(|| vec![false; rows]);
        let mask: BooleanArray = flags.into_iter().map(Some).collect();
        let entity_rows = filter_record_batch(batch, &mask)?;

        let Some(table) = self.summarize(&entity_rows, key_column)? else {
            return Ok(None);
        };
        let fields = vec![
            Field::new(key_column, DataType::Utf8, true),
            Field::new("reclamacoes_agibank", DataType::Int64, false),
        ];
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(table.groups.iter().map(|g| g.key.as_str()))),
            Arc::new(Int64Array::from_iter_values(table.groups.iter().map(|g| g.total as i64))),
        ];
        Ok(Some(build_batch(fields, columns, table.len())?))
    }

    /// Summary by company restricted to banking-area rows
    ///
    /// A row is banking when its area contains any configured keyword,
    /// ignoring case.
    pub fn banking_comparison(&self, batch: &RecordBatch) -> Result<Option<SummaryTable>> {
        let Some(areas) = string_column(batch, &self.sectors.area_column)? else {
            warn!("Area column '{}' not found, skipping", self.sectors.area_column);
            return Ok(None);
        };
        let keywords: Vec<String> = self
            .sectors
            .banking_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let mask: BooleanArray = areas
            .iter()
            .map(|area| {
                Some(area.is_some_and(|a| {
                    let lowered = a.to_lowercase();
                    keywords.iter().any(|k| lowered.contains(k.as_str()))
                }))
            })
            .collect();
        let banking = filter_record_batch(batch, &mask)?;
        if banking.num_rows() == 0 {
            info!("No banking-area rows");
            return Ok(None);
        }

        let table = self.summarize(&banking, &self.sectors.company_column)?;
        if let Some(table) = &table {
            info!("Banks compared: {}", table.len());
        }
        Ok(table)
    }
}
