//! Parquet persistence
//!
//! Snappy-compressed snapshots written in one call or streamed batch by
//! batch, and a plain reader for loading them back.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::util::{safe_create_file, safe_open_file};
use crate::error::{EtlError, Result};
use crate::schema::cast_to_schema;
use crate::utils::logging::{log_operation_complete, log_operation_start};

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

#[allow(clippy::cast_precision_loss)]
fn log_file_size(path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => log::info!(
            "Saved {} ({:.2} MB)",
            path.display(),
            meta.len() as f64 / (1024.0 * 1024.0)
        ),
        Err(_) => log::info!("Saved {} (size unavailable)", path.display()),
    }
}

/// Streaming Parquet writer
///
/// Batches are appended one at a time so a chunked run never holds more than
/// the current chunk. The file is only valid after [`ParquetSink::close`].
pub struct ParquetSink {
    path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    rows: usize,
    started: Instant,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create the output file (and its parent directories)
    pub fn create(path: &Path, schema: SchemaRef) -> Result<Self> {
        log_operation_start("Writing parquet file", path);
        let file = safe_create_file(path, "writing parquet output")?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(writer_properties()))?;
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            rows: 0,
            started: Instant::now(),
        })
    }

    /// Append one batch, casting it to the sink's schema if its column
    /// types differ
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.schema() == self.schema {
            self.writer.write(batch)?;
        } else {
            self.writer.write(&cast_to_schema(batch, &self.schema)?)?;
        }
        self.rows += batch.num_rows();
        Ok(())
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Rows written so far
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush the footer and close the file, returning the rows written
    pub fn close(self) -> Result<usize> {
        self.writer.close()?;
        log_operation_complete("Wrote", &self.path, self.rows, Some(self.started.elapsed()));
        log_file_size(&self.path);
        Ok(self.rows)
    }
}

/// Write batches to a Parquet file
///
/// # Arguments
/// * `path` - Output path; missing parent directories are created
/// * `batches` - Batches sharing one schema
///
/// # Returns
/// The number of rows written
///
/// # Errors
/// Returns an error if there are no batches, the schemas differ or the file
/// cannot be written
pub fn write_parquet(path: &Path, batches: &[RecordBatch]) -> Result<usize> {
    let first = batches
        .first()
        .ok_or_else(|| EtlError::Validation("no batches to write".to_string()))?;

    let mut sink = ParquetSink::create(path, first.schema())?;
    for batch in batches {
        sink.write(batch)?;
    }
    sink.close()
}

/// Read every batch of a Parquet file
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path, "reading parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("Read", path, rows, Some(start.elapsed()));
    Ok(batches)
}
