//! Arrow utilities
//!
//! This module provides utilities for working with Arrow arrays and record batches.

pub mod array_utils;
pub mod batch_ops;

// Re-export commonly used functions for convenience
pub use array_utils::{
    bool_column, find_first_column, has_column, numeric_column, string_column, to_string_array,
};
pub use batch_ops::{
    build_batch, concat_with_union_schema, drop_columns, filter_record_batch, rename_columns,
    with_column,
};
