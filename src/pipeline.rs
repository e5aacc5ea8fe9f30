//! End-to-end processing: cleaning followed by standardization, on one
//! batch or on a stream of chunks.
//!
//! Chunks are independent units of work. The stages hold only read-only
//! configuration, so one [`EtlPipeline`] is shared by every rayon worker.
//! Rows sharing an identifier with a row of an earlier chunk are removed by
//! a [`ChunkDeduplicator`] on the driving thread, after the workers finish,
//! so the first occurrence in file order survives.

use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::row::{OwnedRow, RowConverter, SortField};
use itertools::Itertools;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::cleaning::{CleaningPipeline, CleaningReport};
use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::standardize::StandardizationPipeline;
use crate::utils::arrow::filter_record_batch;
use crate::utils::logging::log_batch_shape;

/// Cleaning and standardization stages built from one configuration
#[derive(Debug)]
pub struct EtlPipeline {
    config: Arc<PipelineConfig>,
    cleaning: CleaningPipeline,
    standardization: StandardizationPipeline,
}

impl EtlPipeline {
    /// Validate the configuration and build every stage
    ///
    /// # Errors
    /// Returns a configuration error if validation fails
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let cleaning = CleaningPipeline::new(&config);
        let standardization = StandardizationPipeline::new(&config)?;
        log::debug!(
            "Standardization stages: {}",
            standardization.stage_names().join(", ")
        );
        Ok(Self {
            config: Arc::new(config),
            cleaning,
            standardization,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn clean(&self, batch: RecordBatch) -> Result<(RecordBatch, CleaningReport)> {
        self.cleaning.run(batch)
    }

    pub fn standardize(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.standardization.run(batch)
    }

    /// Clean then standardize one batch
    pub fn run(&self, batch: RecordBatch) -> Result<(RecordBatch, CleaningReport)> {
        let (cleaned, report) = self.clean(batch)?;
        log_batch_shape("Cleaned batch", &cleaned);
        let standardized = self.standardize(cleaned)?;
        log_batch_shape("Standardized batch", &standardized);
        Ok((standardized, report))
    }

    /// Run independent batches on the rayon pool
    ///
    /// Output order matches input order. Reports are merged.
    pub fn run_batches_parallel(
        &self,
        batches: Vec<RecordBatch>,
    ) -> Result<(Vec<RecordBatch>, CleaningReport)> {
        let results = batches
            .into_par_iter()
            .map(|batch| self.run(batch))
            .collect::<Result<Vec<_>>>()?;

        let mut merged = CleaningReport::default();
        let batches = results
            .into_iter()
            .map(|(batch, report)| {
                merged.merge(&report);
                batch
            })
            .collect();
        Ok((batches, merged))
    }

    /// Drive a chunk stream through the pipeline, handing results to `sink`
    ///
    /// With `parallel`, chunks are processed in windows of one chunk per CPU;
    /// otherwise one at a time. Results reach `sink` in input order either
    /// way, after cross-chunk duplicates are removed.
    pub fn process_chunks<I, F>(&self, chunks: I, parallel: bool, mut sink: F) -> Result<ChunkRunSummary>
    where
        I: IntoIterator<Item = Result<RecordBatch>>,
        F: FnMut(RecordBatch) -> Result<()>,
    {
        let start = Instant::now();
        let window = if parallel { num_cpus::get().max(1) } else { 1 };
        let mut dedup = ChunkDeduplicator::new(&self.config.names.identifier);
        let mut summary = ChunkRunSummary::default();

        for group in &chunks.into_iter().chunks(window) {
            let group = group.collect::<Result<Vec<_>>>()?;
            let (outputs, report) = if parallel {
                self.run_batches_parallel(group)?
            } else {
                let mut report = CleaningReport::default();
                let mut outputs = Vec::with_capacity(group.len());
                for batch in group {
                    let (out, chunk_report) = self.run(batch)?;
                    report.merge(&chunk_report);
                    outputs.push(out);
                }
                (outputs, report)
            };

            summary.report.merge(&report);
            for out in outputs {
                summary.chunks += 1;
                let out = dedup.filter(&out)?;
                summary.rows_written += out.num_rows();
                sink(out)?;
            }
        }

        summary.cross_chunk_duplicates = dedup.removed();
        log::info!(
            "Processed {} chunks ({} rows kept, {} cross-chunk duplicates) in {:?}",
            summary.chunks,
            summary.rows_written,
            summary.cross_chunk_duplicates,
            start.elapsed()
        );
        Ok(summary)
    }
}

impl BatchTransform for EtlPipeline {
    fn name(&self) -> &'static str {
        "etl"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.run(batch).map(|(batch, _)| batch)
    }
}

/// Totals of a chunked run
#[derive(Debug, Clone, Default)]
pub struct ChunkRunSummary {
    pub chunks: usize,
    pub rows_written: usize,
    pub cross_chunk_duplicates: usize,
    pub report: CleaningReport,
}

/// Drops rows whose identifier already appeared in an earlier chunk
///
/// Identifiers are compared as text so chunks with differently inferred
/// identifier types still match. Batches without the identifier column pass
/// through unchanged.
#[derive(Debug)]
pub struct ChunkDeduplicator {
    identifier: String,
    converter: Option<RowConverter>,
    seen: FxHashSet<OwnedRow>,
    removed: usize,
}

impl ChunkDeduplicator {
    #[must_use]
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            converter: None,
            seen: FxHashSet::default(),
            removed: 0,
        }
    }

    /// Rows removed so far
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed
    }

    pub fn filter(&mut self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(column) = batch.column_by_name(&self.identifier) else {
            return Ok(batch.clone());
        };
        let keys: ArrayRef = cast(column, &DataType::Utf8)?;

        let converter = match self.converter.as_mut() {
            Some(converter) => converter,
            None => self
                .converter
                .insert(RowConverter::new(vec![SortField::new(DataType::Utf8)])?),
        };
        let rows = converter.convert_columns(&[keys])?;

        let mask: BooleanArray = rows
            .iter()
            .map(|row| Some(self.seen.insert(row.owned())))
            .collect();
        let dropped = batch.num_rows() - mask.true_count();
        if dropped == 0 {
            return Ok(batch.clone());
        }
        self.removed += dropped;
        filter_record_batch(batch, &mask)
    }
}
