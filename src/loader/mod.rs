//! CSV ingestion
//!
//! Three ways to read a cadastral transaction file: a bounded sample, a
//! chunked iterator covering the whole file in order, and a deferred scan.
//! [`inspect`] reports size, columns and an approximate row count without
//! parsing the body.

mod csv_reader;
mod lazy;

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::cleaning::strip_quotes;
use crate::error::util::safe_open_file;
use crate::error::{EtlError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

pub use csv_reader::CsvChunkReader;
pub use lazy::LazyScan;

/// Parsing options for delimited input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Infer integer, float and date columns instead of keeping text
    pub infer_types: bool,
    /// Infer ISO `YYYY-MM-DD` columns as dates
    pub try_parse_dates: bool,
    pub quote: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_types: true,
            try_parse_dates: true,
            quote: b'"',
        }
    }
}

impl CsvOptions {
    /// Every column read as text, so all chunks share one schema
    #[must_use]
    pub fn raw_text() -> Self {
        Self {
            infer_types: false,
            try_parse_dates: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// File-level facts gathered by [`inspect`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub file_path: PathBuf,
    pub file_size_bytes: u64,
    pub file_size_gb: f64,
    pub num_columns: usize,
    pub columns: Vec<String>,
    /// Line terminators minus the header; quoted newlines are over-counted
    pub estimated_rows: usize,
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_gb(bytes: u64) -> f64 {
    (bytes as f64 / 1024f64.powi(3) * 100.0).round() / 100.0
}

fn count_lines(reader: &mut impl Read) -> std::io::Result<usize> {
    let mut reader = BufReader::with_capacity(1 << 20, reader);
    let mut lines = 0;
    let mut last = None;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count();
        last = buf.last().copied();
        let len = buf.len();
        reader.consume(len);
    }
    if last.is_some_and(|b| b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

/// Report size, column names and an approximate row count of a file
///
/// # Errors
/// Returns an error if the file is missing or cannot be read
pub fn inspect(path: &Path, delimiter: u8) -> Result<DatasetInfo> {
    let start = Instant::now();
    log_operation_start("Inspecting", path);

    let file = safe_open_file(path, "inspecting dataset")?;
    let file_size_bytes = file.metadata().map_err(|e| EtlError::io(path, e))?.len();

    let mut reader = BufReader::new(file);
    let mut header = String::new();
    reader
        .read_line(&mut header)
        .map_err(|e| EtlError::io(path, e))?;

    let columns: Vec<String> = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(header.as_bytes())
        .records()
        .next()
        .transpose()?
        .map(|record| record.iter().map(|c| strip_quotes(c.trim())).collect())
        .unwrap_or_default();

    // header already consumed
    let estimated_rows = count_lines(&mut reader).map_err(|e| EtlError::io(path, e))?;

    let info = DatasetInfo {
        file_path: path.to_path_buf(),
        file_size_bytes,
        file_size_gb: bytes_to_gb(file_size_bytes),
        num_columns: columns.len(),
        columns,
        estimated_rows,
    };
    log_operation_complete("Inspected", path, info.estimated_rows, Some(start.elapsed()));
    Ok(info)
}

/// Read at most `n` rows
///
/// Malformed records are skipped. An empty file (or `n == 0`) yields a
/// zero-row batch with the header's columns.
pub fn load_sample(path: &Path, n: usize, options: &CsvOptions) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Loading sample from", path);

    let mut reader = CsvChunkReader::open(path, n.max(1), options)?;
    let batch = if n == 0 {
        reader.empty_batch()
    } else {
        match reader.next_chunk()? {
            Some(batch) => batch,
            None => reader.empty_batch(),
        }
    };

    if reader.skipped() > 0 {
        log_warning(
            &format!("Skipped {} malformed records while sampling", reader.skipped()),
            Some(path),
        );
    }
    log_operation_complete("Loaded sample from", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Iterate over the file in chunks of at most `chunk_size` rows
///
/// # Errors
/// Returns an error if `chunk_size` is zero or the file cannot be opened
pub fn load_chunked(path: &Path, chunk_size: usize, options: &CsvOptions) -> Result<CsvChunkReader> {
    log::info!(
        "Reading {} in chunks of {chunk_size} rows",
        path.display()
    );
    CsvChunkReader::open(path, chunk_size, options)
}

/// Describe a scan of the whole file without reading it
///
/// A missing file is reported when the scan is driven.
#[must_use]
pub fn load_lazy(path: &Path, options: &CsvOptions) -> LazyScan {
    LazyScan::new(path, options)
}
