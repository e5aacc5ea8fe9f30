//! Error handling for the cadastral ETL pipeline.
//!
//! Only structural failures surface as errors. A cell that cannot be coerced
//! becomes null, and quality problems are reported, not raised.

use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub mod util;

/// Specialized error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// Error opening, reading or writing a file
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// The file the operation was working on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Arrow compute or construction error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error encoding or decoding Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Fatal CSV error (not a single malformed row, those are skipped)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column that an operation requires is absent
    #[error("Column '{column}' not found in record batch")]
    ColumnNotFound {
        /// Name of the missing column
        column: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stage was invoked before the stage it depends on
    #[error("Precondition failed for stage '{stage}': {message}")]
    Precondition {
        /// Stage that refused to run
        stage: String,
        /// What was missing
        message: String,
    },

    /// Invalid input to an operation
    #[error("Validation error: {0}")]
    Validation(String),
}

impl EtlError {
    /// Wrap an IO error with the path it occurred on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Shorthand for a missing column
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Shorthand for a failed stage precondition
    pub fn precondition(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Precondition {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;
