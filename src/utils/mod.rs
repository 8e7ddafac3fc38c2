//! Shared utilities: Arrow helpers, file IO and logging.

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{find_files, versioned_path, write_delimited};
pub use logging::{log_operation_complete, log_operation_start, log_warning};
