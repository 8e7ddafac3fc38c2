//! Dictionary re-encoding of low-cardinality text columns.

use arrow::array::Array;
use arrow::compute::kernels::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::config::CardinalityConfig;
use crate::error::Result;
use crate::utils::arrow::with_column;

/// Key and value types of the categorical encoding
#[must_use]
pub fn categorical_type() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

/// Re-encodes candidate columns whose distinct ratio is small
#[derive(Debug, Clone, Default)]
pub struct LowCardinalityOptimizer {
    config: CardinalityConfig,
}

impl LowCardinalityOptimizer {
    /// Create an optimizer from the cardinality configuration
    #[must_use]
    pub const fn new(config: CardinalityConfig) -> Self {
        Self { config }
    }

    /// Re-encode qualifying columns; returns the batch and the encoded names
    pub fn optimize(&self, batch: &RecordBatch) -> Result<(RecordBatch, Vec<String>)> {
        let rows = batch.num_rows();
        if rows == 0 {
            return Ok((batch.clone(), Vec::new()));
        }

        let mut current = batch.clone();
        let mut encoded = Vec::new();
        for name in &self.config.candidate_columns {
            let Ok(idx) = current.schema().index_of(name) else {
                continue;
            };
            let column = current.column(idx).clone();
            let Some(strings) = column.as_any().downcast_ref::<arrow::array::StringArray>() else {
                debug!("'{name}' is {:?}, not text; left as is", column.data_type());
                continue;
            };

            let distinct: FxHashSet<&str> = strings.iter().flatten().collect();
            let ratio = distinct.len() as f64 / rows as f64;
            if ratio < self.config.max_unique_ratio {
                let dictionary = cast::cast(&column, &categorical_type())?;
                current = with_column(&current, name, dictionary)?;
                debug!("'{name}': {} distinct values (ratio {ratio:.4})", distinct.len());
                encoded.push(name.clone());
            }
        }

        info!("Categorical columns: {}", encoded.len());
        Ok((current, encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, StringArray};
    use arrow::datatypes::{Field, Int32Type, Schema};
    use std::sync::Arc;

    #[test]
    fn test_low_ratio_columns_become_dictionaries() {
        let uf: Vec<&str> = (0..300).map(|i| if i % 2 == 0 { "SP" } else { "RJ" }).collect();
        let cidade: Vec<String> = (0..300).map(|i| format!("c{i}")).collect();
        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("uf", DataType::Utf8, true),
                Field::new("regiao", DataType::Utf8, true),
            ])),
            vec![
                Arc::new(StringArray::from(uf)),
                Arc::new(StringArray::from(cidade)),
            ],
        )
        .unwrap();

        let (optimized, encoded) = LowCardinalityOptimizer::default().optimize(&batch).unwrap();
        assert_eq!(encoded, vec!["uf".to_string()]);
        assert_eq!(optimized.schema().field(0).data_type(), &categorical_type());
        assert_eq!(optimized.schema().field(1).data_type(), &DataType::Utf8);

        let dictionary = optimized.column(0).as_dictionary::<Int32Type>();
        let values = dictionary.values().as_string::<i32>();
        let key = dictionary.keys().value(1) as usize;
        assert_eq!(values.value(key), "RJ");
    }
}
