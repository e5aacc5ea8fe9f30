//! Deferred scans over a CSV file.

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;

use crate::common::traits::BatchTransform;
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{EtlError, Result};
use crate::loader::{CsvChunkReader, CsvOptions};
use crate::schema::unify_batches;

#[derive(Debug)]
enum ScanOp {
    Select(Vec<String>),
    Limit(usize),
    Map(Box<dyn BatchTransform>),
}

/// An unevaluated scan of a CSV file
///
/// Operations are recorded in call order and only run when the scan is
/// driven by [`LazyScan::collect`] or [`LazyScan::for_each_batch`].
#[derive(Debug)]
pub struct LazyScan {
    path: PathBuf,
    options: CsvOptions,
    chunk_size: usize,
    ops: Vec<ScanOp>,
}

impl LazyScan {
    #[must_use]
    pub fn new(path: &Path, options: &CsvOptions) -> Self {
        Self {
            path: path.to_path_buf(),
            options: *options,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep only the named columns, in the given order
    #[must_use]
    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.ops
            .push(ScanOp::Select(columns.into_iter().map(Into::into).collect()));
        self
    }

    /// Stop after `n` rows have passed this point
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.ops.push(ScanOp::Limit(n));
        self
    }

    /// Rows per chunk read from disk
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Run a stage on every chunk
    #[must_use]
    pub fn map_batches<T: BatchTransform + 'static>(mut self, stage: T) -> Self {
        self.ops.push(ScanOp::Map(Box::new(stage)));
        self
    }

    /// Human-readable plan, one operation per line
    #[must_use]
    pub fn describe(&self) -> String {
        let mut plan = format!(
            "SCAN {} (chunk size {})",
            self.path.display(),
            self.chunk_size
        );
        for op in &self.ops {
            let line = match op {
                ScanOp::Select(columns) => format!("SELECT {}", columns.join(", ")),
                ScanOp::Limit(n) => format!("LIMIT {n}"),
                ScanOp::Map(stage) => format!("MAP {}", stage.name()),
            };
            plan.push_str("\n  ");
            plan.push_str(&line);
        }
        plan
    }

    /// Stream the scan one chunk at a time
    ///
    /// Returns the number of rows handed to `f`. Reading stops as soon as a
    /// limit is exhausted.
    pub fn for_each_batch<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(RecordBatch) -> Result<()>,
    {
        let mut reader = CsvChunkReader::open(&self.path, self.chunk_size, &self.options)?;
        let mut remaining: Vec<Option<usize>> = self
            .ops
            .iter()
            .map(|op| match op {
                ScanOp::Limit(n) => Some(*n),
                _ => None,
            })
            .collect();

        let mut emitted = 0;
        while !remaining.iter().any(|r| *r == Some(0)) {
            let Some(chunk) = reader.next_chunk()? else {
                break;
            };
            let batch = self.apply_ops(chunk, &mut remaining)?;
            if batch.num_rows() > 0 {
                emitted += batch.num_rows();
                f(batch)?;
            }
        }
        Ok(emitted)
    }

    /// Materialise the whole scan as one batch
    ///
    /// Chunks whose inferred types differ are widened to a common schema.
    pub fn collect(&self) -> Result<RecordBatch> {
        let mut batches = Vec::new();
        self.for_each_batch(|batch| {
            batches.push(batch);
            Ok(())
        })?;

        if batches.is_empty() {
            let reader = CsvChunkReader::open(&self.path, self.chunk_size, &self.options)?;
            let mut no_limits = vec![None; self.ops.len()];
            return self.apply_ops(reader.empty_batch(), &mut no_limits);
        }
        unify_batches(&batches)
    }

    fn apply_ops(&self, mut batch: RecordBatch, remaining: &mut [Option<usize>]) -> Result<RecordBatch> {
        for (op, left) in self.ops.iter().zip(remaining.iter_mut()) {
            batch = match op {
                ScanOp::Select(columns) => project(&batch, columns)?,
                ScanOp::Limit(_) => {
                    let left = left.get_or_insert(0);
                    let take = (*left).min(batch.num_rows());
                    *left -= take;
                    batch.slice(0, take)
                }
                ScanOp::Map(stage) => stage.transform(batch)?,
            };
        }
        Ok(batch)
    }
}

fn project(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = columns
        .iter()
        .map(|c| schema.index_of(c).map_err(|_| EtlError::column_not_found(c)))
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}
