//! Date coercion to the canonical `DD/MM/YYYY` text form.
//!
//! Each declared date column goes through one of three paths depending on
//! its physical type: typed dates are reformatted, numbers are left alone
//! (a bare year), and text is parsed with the candidate format cascade.

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::adapt::date_utils::{format_dates, parse_date_array, temporal_to_dates};
use crate::schema::adapt::{ColumnRepr, to_string_array};
use crate::schema::{SANITIZED_MARKER, require_stage};
use crate::utils::arrow::{column_index, replace_column};

/// Parse statistics of one date column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateColumnStats {
    pub column: String,
    pub total: usize,
    pub nulls_before: usize,
    pub nulls_after: usize,
    /// Values that were present but could not be parsed
    pub unparsed: usize,
    pub unparsed_fraction: f64,
}

impl DateColumnStats {
    #[allow(clippy::cast_precision_loss)]
    fn new(column: &str, total: usize, nulls_before: usize, nulls_after: usize) -> Self {
        let unparsed = nulls_after.saturating_sub(nulls_before);
        let unparsed_fraction = if total == 0 {
            0.0
        } else {
            unparsed as f64 / total as f64
        };
        Self {
            column: column.to_string(),
            total,
            nulls_before,
            nulls_after,
            unparsed,
            unparsed_fraction,
        }
    }
}

/// Null deltas introduced by date parsing, one entry per coerced column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemporalReport {
    pub columns: Vec<DateColumnStats>,
}

impl TemporalReport {
    /// Total number of values lost to parsing across all columns
    #[must_use]
    pub fn total_unparsed(&self) -> usize {
        self.columns.iter().map(|c| c.unparsed).sum()
    }

    /// Merge the statistics of another batch into this report
    pub fn merge(&mut self, other: &Self) {
        for stats in &other.columns {
            if let Some(existing) = self.columns.iter_mut().find(|c| c.column == stats.column) {
                *existing = DateColumnStats::new(
                    &stats.column,
                    existing.total + stats.total,
                    existing.nulls_before + stats.nulls_before,
                    existing.nulls_after + stats.nulls_after,
                );
            } else {
                self.columns.push(stats.clone());
            }
        }
    }
}

impl fmt::Display for TemporalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.columns {
            writeln!(
                f,
                "{}: {} of {} values unparsed ({:.2}%)",
                c.column,
                c.unparsed,
                c.total,
                c.unparsed_fraction * 100.0
            )?;
        }
        Ok(())
    }
}

/// Coerce one column, returning `None` when it is left unchanged
fn coerce_column(array: &ArrayRef) -> Result<Option<ArrayRef>> {
    let dates = match ColumnRepr::of(array) {
        ColumnRepr::Text(text) => parse_date_array(text),
        ColumnRepr::Temporal(typed) => temporal_to_dates(typed)?,
        ColumnRepr::Integer(_) | ColumnRepr::Float(_) | ColumnRepr::Null(_) => return Ok(None),
        ColumnRepr::OtherText(_) | ColumnRepr::Boolean(_) | ColumnRepr::Other(_) => {
            parse_date_array(&to_string_array(array))
        }
    };
    Ok(Some(Arc::new(format_dates(&dates))))
}

/// Temporal coercer stage
#[derive(Debug, Clone)]
pub struct TemporalCoercer {
    columns: Vec<String>,
}

impl TemporalCoercer {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.date_columns.clone())
    }

    /// Coerce every declared date column present in the batch
    ///
    /// # Errors
    /// Returns [`EtlError::Precondition`](crate::error::EtlError::Precondition)
    /// if the batch has not been sanitized
    pub fn coerce(&self, batch: &RecordBatch) -> Result<(RecordBatch, TemporalReport)> {
        require_stage(batch, SANITIZED_MARKER, self.name())?;

        let mut out = batch.clone();
        let mut report = TemporalReport::default();

        for column in &self.columns {
            let Some(idx) = column_index(&out, column) else {
                log::debug!("Date column '{column}' not present, skipping");
                continue;
            };
            let array = Arc::clone(out.column(idx));
            let Some(coerced) = coerce_column(&array)? else {
                log::debug!("Date column '{column}' is numeric, left as a bare year");
                continue;
            };

            let stats = DateColumnStats::new(
                column,
                array.len(),
                array.null_count(),
                coerced.null_count(),
            );
            if stats.unparsed > 0 {
                log::warn!(
                    "{} values of '{column}' did not match any date format and were set to null",
                    stats.unparsed
                );
            }
            report.columns.push(stats);
            out = replace_column(&out, column, coerced)?;
        }

        Ok((out, report))
    }
}

impl BatchTransform for TemporalCoercer {
    fn name(&self) -> &'static str {
        "temporal_coercer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let (out, report) = self.coerce(&batch)?;
        log::debug!("Date parsing left {} values unparsed", report.total_unparsed());
        Ok(out)
    }
}
