//! Parsing of configured date/time columns into microsecond timestamps.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, TimestampMicrosecondArray};
use arrow::compute::kernels::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};

use crate::config::TemporalConfig;
use crate::error::Result;
use crate::utils::arrow::{to_string_array, with_column};

/// Textual values treated as missing before parsing
pub const NULL_SENTINELS: [&str; 6] = ["", "nan", "NaN", "NULL", "null", "None"];

const TIMESTAMP_TYPE: DataType = DataType::Timestamp(TimeUnit::Microsecond, None);

/// Guess a date-only format from the shape of the value
#[must_use]
pub fn detect_date_format(s: &str) -> Option<&'static str> {
    let bytes = s.as_bytes();
    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return Some("%Y-%m-%d");
    }

    let slash_parts: Vec<&str> = s.split('/').collect();
    if slash_parts.len() == 3 {
        if slash_parts[0].len() == 4 {
            return Some("%Y/%m/%d");
        }
        // Day-first whenever the year comes last
        if slash_parts[2].len() == 4 && slash_parts[0].parse::<u8>().is_ok() {
            return Some("%d/%m/%Y");
        }
    }

    let dot_parts: Vec<&str> = s.split('.').collect();
    if dot_parts.len() == 3 && dot_parts[2].len() == 4 {
        return Some("%d.%m.%Y");
    }

    if s.len() == 8 && bytes.iter().all(u8::is_ascii_digit) {
        return Some("%Y%m%d");
    }

    None
}

fn parse_with_format(s: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a date or date-time string, trying each format in turn
///
/// Date-only formats yield midnight. With `detect` set, a format guessed
/// from the value's shape is tried last.
#[must_use]
pub fn parse_datetime_string(s: &str, formats: &[String], detect: bool) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|format| parse_with_format(s, format))
        .or_else(|| {
            detect
                .then(|| detect_date_format(s))
                .flatten()
                .and_then(|format| parse_with_format(s, format))
        })
}

/// Per-column parse accounting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionStats {
    /// Non-null values before parsing
    pub rows_before: usize,
    /// Non-null values after parsing
    pub rows_after: usize,
    /// `rows_after / rows_before × 100`, or 0 when nothing was present
    pub success_rate: f64,
}

impl ConversionStats {
    /// Build stats from before/after counts
    #[must_use]
    pub fn new(rows_before: usize, rows_after: usize) -> Self {
        let success_rate = if rows_before == 0 {
            0.0
        } else {
            rows_after as f64 / rows_before as f64 * 100.0
        };
        Self {
            rows_before,
            rows_after,
            success_rate,
        }
    }
}

/// Outcome of converting one configured column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConversion {
    /// The column was parsed into timestamps
    Converted(ConversionStats),
    /// The column is absent from the batch
    Skipped,
    /// The column could not be processed and was left unchanged
    Failed {
        /// Values present before the attempt
        rows_before: usize,
        /// Why the conversion failed
        reason: String,
    },
}

impl ColumnConversion {
    /// Stats as reported for this column; failures count as 0% success
    #[must_use]
    pub fn stats(&self) -> Option<ConversionStats> {
        match self {
            Self::Converted(stats) => Some(*stats),
            Self::Failed { rows_before, .. } => Some(ConversionStats {
                rows_before: *rows_before,
                rows_after: 0,
                success_rate: 0.0,
            }),
            Self::Skipped => None,
        }
    }
}

/// Converted batch plus the outcome of every configured column, in order
#[derive(Debug, Clone)]
pub struct TemporalOutcome {
    /// The batch with converted columns replaced
    pub batch: RecordBatch,
    /// One entry per configured column
    pub conversions: Vec<(String, ColumnConversion)>,
}

impl TemporalOutcome {
    /// Stats for every configured column that was present
    #[must_use]
    pub fn stats(&self) -> Vec<(String, ConversionStats)> {
        self.conversions
            .iter()
            .filter_map(|(name, conversion)| conversion.stats().map(|s| (name.clone(), s)))
            .collect()
    }
}

/// Parses configured temporal columns
#[derive(Debug, Clone, Default)]
pub struct TemporalNormalizer {
    config: TemporalConfig,
}

impl TemporalNormalizer {
    /// Create a normalizer from the temporal configuration
    #[must_use]
    pub const fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    /// Convert every configured column present in the batch
    ///
    /// A column that cannot be processed is left unchanged and reported as
    /// [`ColumnConversion::Failed`]; the remaining columns are still
    /// converted.
    pub fn normalize(&self, batch: &RecordBatch) -> Result<TemporalOutcome> {
        let mut current = batch.clone();
        let mut conversions = Vec::with_capacity(self.config.datetime_columns.len());

        for name in &self.config.datetime_columns {
            let Ok(idx) = current.schema().index_of(name) else {
                warn!("Temporal column '{name}' not found, skipping");
                conversions.push((name.clone(), ColumnConversion::Skipped));
                continue;
            };

            let column = current.column(idx).clone();
            let rows_before = column.len() - column.null_count();
            match self.convert_column(name, &column) {
                Ok(parsed) => {
                    let stats = ConversionStats::new(rows_before, parsed.len() - parsed.null_count());
                    info!(
                        "'{name}': {}/{} parsed ({:.1}%)",
                        stats.rows_after, stats.rows_before, stats.success_rate
                    );
                    current = with_column(&current, name, parsed)?;
                    conversions.push((name.clone(), ColumnConversion::Converted(stats)));
                }
                Err(e) => {
                    warn!("Could not convert '{name}': {e}");
                    conversions.push((
                        name.clone(),
                        ColumnConversion::Failed {
                            rows_before,
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        Ok(TemporalOutcome {
            batch: current,
            conversions,
        })
    }

    fn convert_column(&self, name: &str, column: &ArrayRef) -> Result<ArrayRef> {
        match column.data_type() {
            DataType::Timestamp(TimeUnit::Microsecond, None) => return Ok(column.clone()),
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                return Ok(cast::cast(column, &TIMESTAMP_TYPE)?);
            }
            _ => {}
        }

        let fixed_format;
        let (formats, detect): (&[String], bool) = if name == self.config.processed_at_column {
            fixed_format = [self.config.processed_at_format.clone()];
            (&fixed_format, false)
        } else {
            (&self.config.default_formats, self.config.enable_format_detection)
        };

        let strings = to_string_array(column)?;
        let parsed: TimestampMicrosecondArray = strings
            .iter()
            .map(|value| {
                value
                    .map(str::trim)
                    .filter(|v| !NULL_SENTINELS.contains(v))
                    .and_then(|v| parse_datetime_string(v, formats, detect))
                    .map(|dt| dt.and_utc().timestamp_micros())
            })
            .collect();
        Ok(Arc::new(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema, TimestampMicrosecondType};

    fn formats() -> Vec<String> {
        TemporalConfig::default().default_formats
    }

    fn single(name: &str, array: ArrayRef) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new(name, array.data_type().clone(), true)])),
            vec![array],
        )
        .unwrap()
    }

    #[test]
    fn test_day_first_formats() {
        let dt = parse_datetime_string("03/04/2025", &formats(), true).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
        let dt = parse_datetime_string("03/04/2025 14:05", &formats(), true).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "14:05");
        assert!(parse_datetime_string("2025-04-03", &formats(), true).is_some());
        assert!(parse_datetime_string("not a date", &formats(), true).is_none());
    }

    #[test]
    fn test_format_detection_fallback() {
        assert_eq!(detect_date_format("20250403"), Some("%Y%m%d"));
        assert_eq!(detect_date_format("03.04.2025"), Some("%d.%m.%Y"));
        let dt = parse_datetime_string("20250403", &[], true).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
        assert!(parse_datetime_string("20250403", &[], false).is_none());
    }

    #[test]
    fn test_success_rate_is_exact() {
        let values: Vec<&str> = (0..100)
            .map(|i| if i < 80 { "15/01/2025" } else { "garbage" })
            .collect();
        let batch = single("data_abertura", Arc::new(StringArray::from(values)));
        let outcome = TemporalNormalizer::default().normalize(&batch).unwrap();

        let stats = outcome.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].1.rows_before, 100);
        assert_eq!(stats[0].1.rows_after, 80);
        assert!((stats[0].1.success_rate - 80.0).abs() < f64::EPSILON);
        assert_eq!(
            outcome.batch.schema().field(0).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, None)
        );
    }

    #[test]
    fn test_sentinels_become_null_and_absent_columns_skip() {
        let batch = single(
            "data_resposta",
            Arc::new(StringArray::from(vec![Some(" 01/02/2025 "), Some("NULL"), None])),
        );
        let outcome = TemporalNormalizer::default().normalize(&batch).unwrap();
        let parsed = outcome.batch.column(0).as_primitive::<TimestampMicrosecondType>();
        assert!(parsed.is_valid(0));
        assert!(parsed.is_null(1));
        assert!(matches!(
            outcome.conversions.iter().find(|(n, _)| n == "data_abertura"),
            Some((_, ColumnConversion::Skipped))
        ));
    }

    #[test]
    fn test_processed_at_uses_machine_format() {
        let batch = single(
            "processed_at",
            Arc::new(StringArray::from(vec!["2025-06-01 12:30:45.123456", "01/06/2025"])),
        );
        let outcome = TemporalNormalizer::default().normalize(&batch).unwrap();
        let stats = outcome.stats();
        assert_eq!(stats[0].1.rows_after, 1);
    }

    #[test]
    fn test_zero_present_values_rate_is_zero() {
        let batch = single("prazo_resposta", Arc::new(Int64Array::from(vec![None, None])));
        let outcome = TemporalNormalizer::default().normalize(&batch).unwrap();
        let stats = outcome.stats();
        assert_eq!(stats[0].1.rows_before, 0);
        assert!(stats[0].1.success_rate.abs() < f64::EPSILON);
    }
}
