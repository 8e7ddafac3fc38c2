//! Utilities for working with Arrow arrays.
//!
//! This module provides utility functions for safely extracting and converting
//! data from Arrow arrays, handling type conversion and error handling.

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::kernels::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::Result;

/// Whether the batch has a column with the given name
#[must_use]
pub fn has_column(batch: &RecordBatch, column_name: &str) -> bool {
    batch.schema().index_of(column_name).is_ok()
}

/// Return the first candidate column present in the batch
#[must_use]
pub fn find_first_column<'a>(batch: &RecordBatch, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .map(String::as_str)
        .find(|name| has_column(batch, name))
}

/// Render any array as a `Utf8` array
///
/// Dictionary, numeric, boolean and temporal arrays are cast with Arrow's
/// cast kernel; nulls stay null.
pub fn to_string_array(array: &ArrayRef) -> Result<StringArray> {
    match array.data_type() {
        DataType::Utf8 => Ok(array.as_string::<i32>().clone()),
        other => {
            debug!("Casting {other:?} column to Utf8");
            let casted = cast::cast(array, &DataType::Utf8)?;
            Ok(casted.as_string::<i32>().clone())
        }
    }
}

/// Get a column as strings, or `None` when the column is absent
pub fn string_column(batch: &RecordBatch, column_name: &str) -> Result<Option<StringArray>> {
    match batch.schema().index_of(column_name) {
        Ok(idx) => to_string_array(batch.column(idx)).map(Some),
        Err(_) => Ok(None),
    }
}

/// Interpret a textual boolean the way the stage writers emit them
#[must_use]
pub fn parse_bool_token(value: &str) -> Option<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") || v == "1" => Some(true),
        v if v.eq_ignore_ascii_case("false") || v == "0" => Some(false),
        _ => None,
    }
}

/// Get a flag column as plain booleans (null and unparseable are `false`)
///
/// Accepts native boolean columns as well as textual ones reloaded from a
/// previous stage's output. Returns `None` when the column is absent.
pub fn bool_column(batch: &RecordBatch, column_name: &str) -> Result<Option<Vec<bool>>> {
    let Ok(idx) = batch.schema().index_of(column_name) else {
        return Ok(None);
    };
    let column = batch.column(idx);

    let values = if let DataType::Boolean = column.data_type() {
        let flags = column.as_boolean();
        (0..flags.len())
            .map(|i| flags.is_valid(i) && flags.value(i))
            .collect()
    } else {
        let strings = to_string_array(column)?;
        (0..strings.len())
            .map(|i| strings.is_valid(i) && parse_bool_token(strings.value(i)).unwrap_or(false))
            .collect()
    };

    Ok(Some(values))
}

/// Parse a column as `f64` values; non-numeric entries become `None`
pub fn numeric_column(batch: &RecordBatch, column_name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Some(strings) = string_column(batch, column_name)? else {
        return Ok(None);
    };
    let values = (0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                None
            } else {
                strings.value(i).trim().replace(',', ".").parse::<f64>().ok()
            }
        })
        .collect();
    Ok(Some(values))
}
