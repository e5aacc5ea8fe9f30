//! Cleaning and standardization of cadastral property-transaction records.
//!
//! A delimited source file is read into Arrow record batches, passed through
//! an ordered list of pure cleaning stages (structural sanitizing, business
//! rules, text and categorical normalization, date and numeric coercion,
//! null and duplicate handling) and then standardized (calendar features,
//! inflation adjustment, geographic key). The [`quality`] module reports on
//! the result without changing it.

pub mod cleaning;
pub mod common;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod standardize;
pub mod utils;

// Core types
pub use common::BatchTransform;
pub use config::{NullStrategy, OutlierConfig, OutlierMethod, PipelineConfig};
pub use error::{EtlError, Result};
pub use pipeline::{ChunkRunSummary, EtlPipeline};

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Ingestion
pub use loader::{
    CsvChunkReader, CsvOptions, DatasetInfo, LazyScan, inspect, load_chunked, load_lazy,
    load_sample,
};

// Stages
pub use cleaning::{CleaningPipeline, CleaningReport, apply_all_cleaning};
pub use quality::{QualityReport, detect_outliers, generate_quality_report, validate_data_quality};
pub use standardize::{StandardizationPipeline, apply_all_standardization};

// Persistence
pub use utils::io::{ParquetSink, read_parquet, write_csv, write_parquet};
