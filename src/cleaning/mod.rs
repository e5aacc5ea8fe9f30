//! The cleaning pipeline.
//!
//! Stage order is fixed:
//!
//! 1. structural sanitization (quotes in names and cells)
//! 2. business rules (obsolete columns, sentinels, registry office)
//! 3. text normalization
//! 4. municipality remap and department normalization
//! 5. date coercion
//! 6. numeric coercion
//! 7. null handling and deduplication

pub mod business_rules;
pub mod categorical;
pub mod finalize;
pub mod numeric;
pub mod sanitize;
pub mod temporal;
pub mod text;

use std::fmt;
use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;

pub use business_rules::{BusinessRules, normalize_registry_office};
pub use categorical::{DepartmentNormalizer, MunicipalityRemapper, SynonymTable, fold_accents};
pub use finalize::{FinalizeReport, Finalizer, remove_duplicates};
pub use numeric::{NumericCoercer, parse_monetary};
pub use sanitize::{StructuralSanitizer, clean_quotes_global, strip_quotes};
pub use temporal::{DateColumnStats, TemporalCoercer, TemporalReport};
pub use text::TextNormalizer;

/// Rows and time spent in one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub rows_out: usize,
    pub elapsed: Duration,
}

/// What the cleaning pipeline did to a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_in: usize,
    pub columns_out: usize,
    pub stages: Vec<StageTiming>,
    pub temporal: TemporalReport,
    pub finalize: FinalizeReport,
}

impl CleaningReport {
    /// Merge the report of another chunk into this one
    pub fn merge(&mut self, other: &Self) {
        self.rows_in += other.rows_in;
        self.rows_out += other.rows_out;
        self.columns_in = self.columns_in.max(other.columns_in);
        self.columns_out = self.columns_out.max(other.columns_out);

        for timing in &other.stages {
            match self.stages.iter_mut().find(|t| t.stage == timing.stage) {
                Some(existing) => {
                    existing.rows_out += timing.rows_out;
                    existing.elapsed += timing.elapsed;
                }
                None => self.stages.push(timing.clone()),
            }
        }

        self.temporal.merge(&other.temporal);
        self.finalize.default_filled += other.finalize.default_filled;
        self.finalize.zero_filled += other.finalize.zero_filled;
        self.finalize.rows_dropped_nulls += other.finalize.rows_dropped_nulls;
        self.finalize.duplicates_removed += other.finalize.duplicates_removed;
    }
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rows: {} -> {}, columns: {} -> {}",
            self.rows_in, self.rows_out, self.columns_in, self.columns_out
        )?;
        for timing in &self.stages {
            writeln!(f, "  {:<24} {:>10} rows  {:?}", timing.stage, timing.rows_out, timing.elapsed)?;
        }
        write!(f, "{}", self.temporal)?;
        writeln!(
            f,
            "Default fills: {}, zero fills: {}, rows dropped for nulls: {}, duplicates removed: {}",
            self.finalize.default_filled,
            self.finalize.zero_filled,
            self.finalize.rows_dropped_nulls,
            self.finalize.duplicates_removed
        )
    }
}

/// The ordered cleaning stages, built once from a configuration
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    sanitizer: StructuralSanitizer,
    business_rules: BusinessRules,
    text: TextNormalizer,
    municipality: MunicipalityRemapper,
    department: DepartmentNormalizer,
    temporal: TemporalCoercer,
    numeric: NumericCoercer,
    finalizer: Finalizer,
}

impl CleaningPipeline {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            sanitizer: StructuralSanitizer,
            business_rules: BusinessRules::from_config(config),
            text: TextNormalizer::from_config(config),
            municipality: MunicipalityRemapper::from_config(config),
            department: DepartmentNormalizer::from_config(config),
            temporal: TemporalCoercer::from_config(config),
            numeric: NumericCoercer::from_config(config),
            finalizer: Finalizer::from_config(config),
        }
    }

    /// Run every stage and collect a report
    ///
    /// # Arguments
    /// * `batch` - Raw batch as read from the source
    ///
    /// # Returns
    /// The cleaned batch and a [`CleaningReport`]
    ///
    /// # Errors
    /// Returns an error if a stage fails; per-value coercion failures become
    /// nulls and never fail the run
    pub fn run(&self, batch: RecordBatch) -> Result<(RecordBatch, CleaningReport)> {
        let mut report = CleaningReport {
            rows_in: batch.num_rows(),
            columns_in: batch.num_columns(),
            ..CleaningReport::default()
        };

        let simple: [&dyn BatchTransform; 5] = [
            &self.sanitizer,
            &self.business_rules,
            &self.text,
            &self.municipality,
            &self.department,
        ];

        let mut batch = batch;
        for stage in simple {
            let start = Instant::now();
            batch = stage.transform(batch)?;
            report.stages.push(timing(stage.name(), &batch, start));
        }

        let start = Instant::now();
        let (coerced, temporal) = self.temporal.coerce(&batch)?;
        batch = coerced;
        report.temporal = temporal;
        report.stages.push(timing(self.temporal.name(), &batch, start));

        let start = Instant::now();
        batch = self.numeric.apply(&batch)?;
        report.stages.push(timing(self.numeric.name(), &batch, start));

        let start = Instant::now();
        let (finalized, finalize) = self.finalizer.finalize(&batch)?;
        batch = finalized;
        report.finalize = finalize;
        report.stages.push(timing(self.finalizer.name(), &batch, start));

        report.rows_out = batch.num_rows();
        report.columns_out = batch.num_columns();
        Ok((batch, report))
    }
}

fn timing(stage: &str, batch: &RecordBatch, start: Instant) -> StageTiming {
    StageTiming {
        stage: stage.to_string(),
        rows_out: batch.num_rows(),
        elapsed: start.elapsed(),
    }
}

impl BatchTransform for CleaningPipeline {
    fn name(&self) -> &'static str {
        "cleaning"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let (out, report) = self.run(batch)?;
        log::info!(
            "Cleaning finished: {} -> {} rows",
            report.rows_in,
            report.rows_out
        );
        Ok(out)
    }
}

/// Clean a batch with the given configuration
pub fn apply_all_cleaning(batch: RecordBatch, config: &PipelineConfig) -> Result<RecordBatch> {
    CleaningPipeline::new(config).transform(batch)
}
