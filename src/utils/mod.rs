//! Shared helpers: Arrow batch manipulation, persistence codecs, logging
//! and progress reporting.

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{ParquetSink, read_parquet, write_csv, write_parquet};
pub use logging::{log_operation_complete, log_operation_start, log_warning};
