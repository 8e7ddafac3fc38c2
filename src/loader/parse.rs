//! Record parsing strategies and column type inference.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::Field;
use arrow::record_batch::RecordBatch;
use csv::{ByteRecord, ReaderBuilder};
use log::debug;

use crate::error::{PipelineError, Result};
use crate::utils::arrow::build_batch;

/// One way of turning file bytes into rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// UTF-8 with quoting; rows whose field count differs from the header
    /// are skipped and a quoted field running across lines fails the read
    StrictUtf8,
    /// UTF-8 with quotes read as plain text; short rows are padded with
    /// nulls, over-long rows are skipped
    TolerantUtf8,
    /// Latin-1 single-byte decoding with the tolerant row handling
    Latin1,
}

impl ReadStrategy {
    /// The fallback chain, in the order it is attempted
    pub const FALLBACK_CHAIN: [Self; 3] = [Self::StrictUtf8, Self::TolerantUtf8, Self::Latin1];

    /// Short label used in the attempt log
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StrictUtf8 => "utf-8 strict",
            Self::TolerantUtf8 => "utf-8 tolerant",
            Self::Latin1 => "latin-1",
        }
    }

    const fn flexible(self) -> bool {
        !matches!(self, Self::StrictUtf8)
    }

    const fn quoting(self) -> bool {
        matches!(self, Self::StrictUtf8)
    }

    fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::StrictUtf8 | Self::TolerantUtf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| {
                    PipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                }),
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Parse delimited bytes into a batch of inferred column types
///
/// Returns the batch and the number of malformed rows skipped.
pub fn parse_delimited(
    bytes: &[u8],
    delimiter: u8,
    strategy: ReadStrategy,
) -> Result<(RecordBatch, usize)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(strategy.flexible())
        .quoting(strategy.quoting())
        .from_reader(bytes);

    let headers = reader
        .byte_headers()?
        .iter()
        .map(|h| strategy.decode(h))
        .collect::<Result<Vec<_>>>()?;
    if headers.is_empty() {
        return Err(PipelineError::Schema("no header row".to_string()));
    }
    let headers = unique_headers(headers);
    let width = headers.len();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut skipped = 0usize;
    let mut record = ByteRecord::new();

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) => {
                debug!("Skipping malformed row: {e}");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        if record.len() > width {
            skipped += 1;
            continue;
        }

        // An unbalanced quote swallows every following line into one field
        if strategy.quoting() && record.iter().any(|f| f.contains(&b'\n') || f.contains(&b'\r')) {
            let line = record.position().map_or(0, csv::Position::line);
            return Err(PipelineError::Schema(format!(
                "quoted field starting on line {line} runs across records"
            )));
        }

        for (idx, column) in cells.iter_mut().enumerate() {
            let value = match record.get(idx) {
                Some(field) if !field.is_empty() => Some(strategy.decode(field)?),
                _ => None,
            };
            column.push(value);
        }
    }

    let num_rows = cells.first().map_or(0, Vec::len);
    let (fields, columns): (Vec<Field>, Vec<ArrayRef>) = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| {
            let array = infer_column(values);
            (Field::new(name, array.data_type().clone(), true), array)
        })
        .unzip();

    Ok((build_batch(fields, columns, num_rows)?, skipped))
}

/// Make header names unique, suffixing repeats with `.1`, `.2`, ...
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for (i, header) in headers.into_iter().enumerate() {
        // A UTF-8 byte order mark survives only on the first header
        let header = if i == 0 {
            header.trim_start_matches('\u{feff}').to_string()
        } else {
            header
        };
        let mut candidate = header.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{header}.{n}");
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

fn looks_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

fn looks_float(value: &str) -> bool {
    let unsigned = value.trim_start_matches(&['-', '+'][..]).as_bytes();
    let padded_code = unsigned.len() > 1 && unsigned[0] == b'0' && unsigned[1].is_ascii_digit();
    !padded_code
        && value.bytes().any(|b| b.is_ascii_digit())
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        && value.parse::<f64>().is_ok()
}

fn looks_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

/// Build the narrowest array type that holds every non-null value
fn infer_column(values: Vec<Option<String>>) -> ArrayRef {
    let present = || values.iter().flatten();
    let has_values = present().next().is_some();

    if has_values && present().all(|v| looks_integer(v)) {
        let parsed: Option<Vec<Option<i64>>> = values
            .iter()
            .map(|v| match v {
                Some(s) => s.parse::<i64>().ok().map(Some),
                None => Some(None),
            })
            .collect();
        if let Some(parsed) = parsed {
            return Arc::new(Int64Array::from(parsed));
        }
    }

    if has_values && present().all(|v| looks_float(v)) {
        let parsed: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.as_deref().and_then(|s| s.parse::<f64>().ok()))
            .collect();
        return Arc::new(Float64Array::from(parsed));
    }

    if has_values && present().all(|v| looks_bool(v)) {
        let parsed: Vec<Option<bool>> = values
            .iter()
            .map(|v| v.as_deref().map(|s| s.eq_ignore_ascii_case("true")))
            .collect();
        return Arc::new(BooleanArray::from(parsed));
    }

    Arc::new(StringArray::from(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::DataType;

    #[test]
    fn test_strict_skips_rows_with_wrong_width() {
        let bytes = b"a;b\n1;x\n2;y;extra\n3\n4;z\n";
        let (batch, skipped) = parse_delimited(bytes, b';', ReadStrategy::StrictUtf8).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_tolerant_pads_short_rows() {
        let bytes = b"a;b\n1;x\n2;y;extra\n3\n";
        let (batch, skipped) = parse_delimited(bytes, b';', ReadStrategy::TolerantUtf8).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(skipped, 1);
        assert!(batch.column(1).is_null(1));
    }

    #[test]
    fn test_invalid_utf8_fails_until_latin1() {
        let bytes = b"cidade\nCafel\xe2ndia\n";
        assert!(parse_delimited(bytes, b',', ReadStrategy::StrictUtf8).is_err());
        assert!(parse_delimited(bytes, b',', ReadStrategy::TolerantUtf8).is_err());
        let (batch, _) = parse_delimited(bytes, b',', ReadStrategy::Latin1).unwrap();
        assert_eq!(batch.column(0).as_string::<i32>().value(0), "Cafelândia");
    }

    #[test]
    fn test_type_inference() {
        let bytes = b"n;f;b;code;s\n1;1.5;True;007;x\n2;2;false;010;\n";
        let (batch, _) = parse_delimited(bytes, b';', ReadStrategy::StrictUtf8).unwrap();
        let types: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.data_type().clone())
            .collect();
        assert_eq!(
            types,
            vec![
                DataType::Int64,
                DataType::Float64,
                DataType::Boolean,
                DataType::Utf8,
                DataType::Utf8
            ]
        );
    }

    #[test]
    fn test_unbalanced_quote_falls_through_to_tolerant() {
        let bytes = b"a;b\n1;\"x\n2;y\n3;z\n";
        assert!(parse_delimited(bytes, b';', ReadStrategy::StrictUtf8).is_err());

        let (batch, skipped) = parse_delimited(bytes, b';', ReadStrategy::TolerantUtf8).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(skipped, 0);
        assert_eq!(batch.column(1).as_string::<i32>().value(0), "\"x");
    }

    #[test]
    fn test_strict_keeps_quoted_delimiters() {
        let bytes = b"a;b\n1;\"x;y\"\n2;z\n";
        let (batch, _) = parse_delimited(bytes, b';', ReadStrategy::StrictUtf8).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column(1).as_string::<i32>().value(0), "x;y");
    }

    #[test]
    fn test_empty_input_has_no_table() {
        for strategy in ReadStrategy::FALLBACK_CHAIN {
            assert!(parse_delimited(b"", b';', strategy).is_err());
        }
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let (batch, _) =
            parse_delimited(b"\xef\xbb\xbfa,a,b\n1,2,3\n", b',', ReadStrategy::StrictUtf8).unwrap();
        let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["a", "a.1", "b"]);
    }
}
