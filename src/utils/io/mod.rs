//! Persistence codecs
//!
//! Parquet for the typed snapshot and delimited text for inspection.

pub mod delimited;
pub mod parquet;

pub use self::delimited::write_csv;
pub use self::parquet::{ParquetSink, read_parquet, write_parquet};
