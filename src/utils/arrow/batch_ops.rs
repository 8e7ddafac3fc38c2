//! Whole-batch operations: adding, dropping and renaming columns, boolean
//! filtering and schema-unifying concatenation.

use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Array, ArrayRef, BooleanArray, new_null_array};
use arrow::compute::kernels::cast;
use arrow::compute::{concat_batches, filter_record_batch as arrow_filter};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;

use crate::error::{PipelineError, Result};

/// Build a batch, allowing a zero-column batch to carry a row count
pub fn build_batch(fields: Vec<Field>, columns: Vec<ArrayRef>, num_rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

/// Append a column, or replace it when a column of that name exists
pub fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    if array.len() != batch.num_rows() {
        return Err(PipelineError::Schema(format!(
            "Column '{name}' has {} values but batch has {} rows",
            array.len(),
            batch.num_rows()
        )));
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let field = Field::new(name, array.data_type().clone(), true);

    if let Ok(idx) = schema.index_of(name) {
        fields[idx] = field;
        columns[idx] = array;
    } else {
        fields.push(field);
        columns.push(array);
    }

    build_batch(fields, columns, batch.num_rows())
}

/// Remove the named columns; names that are absent are ignored
pub fn drop_columns(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let (fields, columns): (Vec<Field>, Vec<ArrayRef>) = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(field, _)| !names.contains(&field.name().as_str()))
        .map(|(field, column)| (field.as_ref().clone(), column.clone()))
        .unzip();
    build_batch(fields, columns, batch.num_rows())
}

/// Replace every column name, keeping order, types and data
pub fn rename_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    if names.len() != batch.num_columns() {
        return Err(PipelineError::Schema(format!(
            "Expected {} column names, got {}",
            batch.num_columns(),
            names.len()
        )));
    }
    let fields = batch
        .schema()
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| field.as_ref().clone().with_name(name))
        .collect();
    build_batch(fields, batch.columns().to_vec(), batch.num_rows())
}

/// Filter a record batch based on a boolean mask
///
/// # Errors
/// Returns an error if the mask length does not match the batch
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(PipelineError::Schema(format!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        )));
    }
    if batch.num_columns() == 0 {
        let kept = mask.true_count();
        return build_batch(Vec::new(), Vec::new(), kept);
    }
    Ok(arrow_filter(batch, mask)?)
}

/// Concatenate batches whose column sets may differ
///
/// The result carries the union of all columns in order of first
/// appearance. Columns missing from a batch are filled with nulls; columns
/// whose type differs between batches are unified as `Utf8`.
pub fn concat_with_union_schema(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = Vec::new();
    for batch in batches {
        for field in batch.schema().fields() {
            match fields.iter_mut().find(|f| f.name() == field.name()) {
                Some(existing) if existing.data_type() != field.data_type() => {
                    debug!(
                        "Column '{}' has types {:?} and {:?}; unifying as Utf8",
                        field.name(),
                        existing.data_type(),
                        field.data_type()
                    );
                    *existing = Field::new(field.name(), DataType::Utf8, true);
                }
                Some(_) => {}
                None => fields.push(Field::new(field.name(), field.data_type().clone(), true)),
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let aligned = batches
        .iter()
        .map(|batch| align_to_schema(batch, &schema))
        .collect::<Result<Vec<_>>>()?;

    let total_rows: usize = aligned.iter().map(RecordBatch::num_rows).sum();
    if schema.fields().is_empty() {
        return build_batch(Vec::new(), Vec::new(), total_rows);
    }

    concat_batches(&schema, &aligned)
        .with_context(|| format!("Failed to concatenate {} batches", aligned.len()))
        .map_err(|e| PipelineError::Schema(format!("{e:#}")))
}

fn align_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.schema().index_of(field.name()) {
            Ok(idx) => {
                let column = batch.column(idx);
                if column.data_type() == field.data_type() {
                    Ok(column.clone())
                } else {
                    Ok(cast::cast(column, field.data_type())?)
                }
            }
            Err(_) => Ok(new_null_array(field.data_type(), batch.num_rows())),
        })
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema.clone(), columns, &options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray, Int64Array, StringArray};

    fn batch(names: &[&str], rows: usize) -> RecordBatch {
        let fields = names
            .iter()
            .map(|n| Field::new(*n, DataType::Utf8, true))
            .collect();
        let columns = names
            .iter()
            .map(|n| Arc::new(StringArray::from(vec![Some(*n); rows])) as ArrayRef)
            .collect();
        build_batch(fields, columns, rows).unwrap()
    }

    #[test]
    fn test_union_concat_fills_missing_columns() {
        let a = batch(&["x", "y"], 2);
        let b = batch(&["y", "z"], 1);
        let combined = concat_with_union_schema(&[a, b]).unwrap();

        assert_eq!(combined.num_rows(), 3);
        let names: Vec<_> = combined.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(combined.column(0).null_count(), 1);
        assert_eq!(combined.column(2).null_count(), 2);
    }

    #[test]
    fn test_union_concat_unifies_conflicting_types() {
        let a = build_batch(
            vec![Field::new("n", DataType::Int64, true)],
            vec![Arc::new(Int64Array::from(vec![1, 2]))],
            2,
        )
        .unwrap();
        let b = batch(&["n"], 1);
        let combined = concat_with_union_schema(&[a, b]).unwrap();
        assert_eq!(combined.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(combined.column(0).as_string::<i32>().value(0), "1");
    }

    #[test]
    fn test_with_column_replaces_existing() {
        let base = batch(&["x"], 2);
        let replaced = with_column(
            &base,
            "x",
            Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
        )
        .unwrap();
        assert_eq!(replaced.num_columns(), 1);
        assert_eq!(replaced.column(0).as_string::<i32>().value(1), "b");
    }

    #[test]
    fn test_drop_and_rename() {
        let base = batch(&["x", "y", "z"], 1);
        let dropped = drop_columns(&base, &["y", "missing"]).unwrap();
        assert_eq!(dropped.num_columns(), 2);
        let renamed = rename_columns(&dropped, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(renamed.schema().field(1).name(), "b");
    }
}
