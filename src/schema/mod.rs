//! Silver-stage schema standardization: column names, temporal types and
//! categorical encodings.

pub mod canonicalize;
pub mod cardinality;
pub mod temporal;

pub use canonicalize::{RenameMap, SchemaCanonicalizer, canonical_name};
pub use cardinality::{LowCardinalityOptimizer, categorical_type};
pub use temporal::{
    ColumnConversion, ConversionStats, NULL_SENTINELS, TemporalNormalizer, TemporalOutcome,
    detect_date_format, parse_datetime_string,
};
