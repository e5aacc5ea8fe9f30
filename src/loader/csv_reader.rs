//! Chunked CSV reading into Arrow record batches.
//!
//! Records are parsed with the `csv` crate in flexible mode. A record whose
//! field count differs from the header, or that is not valid UTF-8, is
//! skipped and counted instead of failing the read.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::error::util::safe_open_file;
use crate::error::{EtlError, Result};
use crate::loader::CsvOptions;
use crate::schema::adapt::date_utils::naive_to_date32;
use crate::utils::arrow::rebuild_batch;

/// Upper bound on the rows reserved up front for one chunk
const INITIAL_CHUNK_CAPACITY: usize = 8192;

/// Inferred type of one column of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Int64,
    Float64,
    Date32,
    Utf8,
}

fn is_iso_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Digit strings that must stay text: zero-padded codes and values too wide for `i64`
fn is_code(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && ((digits.len() > 1 && digits.starts_with('0')) || s.parse::<i64>().is_err())
}

fn is_fractional(s: &str) -> bool {
    s.contains(['.', 'e', 'E']) && s.parse::<f64>().is_ok_and(f64::is_finite)
}

fn infer(values: &[Option<String>], options: &CsvOptions) -> Inferred {
    let mut present = values.iter().flatten().peekable();
    if !options.infer_types || present.peek().is_none() {
        return Inferred::Utf8;
    }

    let present: Vec<&String> = present.collect();
    if present.iter().any(|v| is_code(v)) {
        Inferred::Utf8
    } else if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        Inferred::Int64
    } else if present
        .iter()
        .all(|v| v.parse::<i64>().is_ok() || is_fractional(v))
    {
        Inferred::Float64
    } else if options.try_parse_dates && present.iter().all(|v| is_iso_date(v)) {
        Inferred::Date32
    } else {
        Inferred::Utf8
    }
}

/// Build a typed column from raw cells; empty cells are already `None`
fn build_column(values: Vec<Option<String>>, options: &CsvOptions) -> ArrayRef {
    match infer(&values, options) {
        Inferred::Int64 => Arc::new(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse::<i64>().ok()))
                .collect::<Int64Array>(),
        ),
        Inferred::Float64 => Arc::new(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.parse::<f64>().ok()))
                .collect::<Float64Array>(),
        ),
        Inferred::Date32 => Arc::new(
            values
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                        .map(naive_to_date32)
                })
                .collect::<Date32Array>(),
        ),
        Inferred::Utf8 => Arc::new(StringArray::from(values)),
    }
}

/// Iterator over bounded batches of a CSV file
///
/// Owns the only file handle of the read; it is released when the reader is
/// dropped, whether the file was read to the end or not.
#[derive(Debug)]
pub struct CsvChunkReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
    options: CsvOptions,
    chunk_size: usize,
    rows_read: usize,
    skipped: usize,
    finished: bool,
}

impl CsvChunkReader {
    /// Open a file for chunked reading
    ///
    /// # Errors
    /// Returns an error if the chunk size is zero, the file cannot be opened
    /// or the header cannot be read
    pub fn open(path: &Path, chunk_size: usize, options: &CsvOptions) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EtlError::Validation("chunk size must be positive".to_string()));
        }

        let file = safe_open_file(path, "reading csv input")?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(options.has_header)
            .flexible(true)
            .from_reader(file);

        let first = reader.headers()?;
        let headers = if options.has_header {
            first.iter().map(str::to_string).collect()
        } else {
            (1..=first.len()).map(|i| format!("column_{i}")).collect()
        };

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
            options: *options,
            chunk_size,
            rows_read: 0,
            skipped: 0,
            finished: false,
        })
    }

    /// Column names of the file
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows emitted so far
    #[must_use]
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Malformed records skipped so far
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bytes of the file consumed so far
    #[must_use]
    pub fn byte_position(&self) -> u64 {
        self.reader.position().byte()
    }

    /// All-text schema of the file's columns
    #[must_use]
    pub fn text_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.headers
                .iter()
                .map(|h| Field::new(h, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ))
    }

    /// Zero-row batch with the file's columns
    #[must_use]
    pub fn empty_batch(&self) -> RecordBatch {
        RecordBatch::new_empty(self.text_schema())
    }

    /// Read the next chunk, `None` once the file is exhausted
    pub fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        if self.finished {
            return Ok(None);
        }

        let width = self.headers.len();
        let capacity = self.chunk_size.min(INITIAL_CHUNK_CAPACITY);
        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(capacity); width];
        let mut record = csv::StringRecord::new();
        let mut rows = 0;

        while rows < self.chunk_size {
            match self.reader.read_record(&mut record) {
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Ok(true) if record.len() != width => {
                    self.skipped += 1;
                    log::debug!(
                        "Skipping record at line {:?}: {} fields, expected {width}",
                        record.position().map(csv::Position::line),
                        record.len()
                    );
                }
                Ok(true) => {
                    for (column, value) in columns.iter_mut().zip(record.iter()) {
                        column.push((!value.is_empty()).then(|| value.to_string()));
                    }
                    rows += 1;
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                    self.skipped += 1;
                    log::debug!("Skipping record with invalid UTF-8: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.finished && self.skipped > 0 {
            log::warn!(
                "Skipped {} malformed records in {}",
                self.skipped,
                self.path.display()
            );
        }
        if rows == 0 {
            return Ok(None);
        }

        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|values| build_column(values, &self.options))
            .collect();
        let fields = self
            .headers
            .iter()
            .zip(&arrays)
            .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
            .collect::<Vec<_>>();

        self.rows_read += rows;
        rebuild_batch(Arc::new(Schema::new(fields)), arrays, rows).map(Some)
    }
}

impl Iterator for CsvChunkReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
