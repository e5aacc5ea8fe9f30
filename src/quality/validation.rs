//! Range, critical-column and schema-presence checks.

use std::collections::BTreeMap;

use arrow::array::{Array, AsArray};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::error::Result;
use crate::schema::adapt::to_float64;
use crate::utils::arrow::{column_index, get_column};

/// Outcome of a range check on one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeValidation {
    pub column: String,
    pub actual_min: Option<f64>,
    pub actual_max: Option<f64>,
    pub expected_min: Option<f64>,
    pub expected_max: Option<f64>,
    pub below_min_count: usize,
    pub above_max_count: usize,
    pub valid: bool,
}

impl RangeValidation {
    #[must_use]
    pub fn out_of_range(&self) -> usize {
        self.below_min_count + self.above_max_count
    }
}

/// Count the values of a column outside an inclusive range
///
/// Either bound may be omitted. Nulls are never out of range.
///
/// # Errors
/// Returns an error if the column does not exist
pub fn validate_ranges(
    batch: &RecordBatch,
    column: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<RangeValidation> {
    let values = to_float64(get_column(batch, column)?);
    let values = values.as_primitive::<Float64Type>();

    let mut actual_min: Option<f64> = None;
    let mut actual_max: Option<f64> = None;
    let mut below_min_count = 0;
    let mut above_max_count = 0;

    for v in values.iter().flatten() {
        actual_min = Some(actual_min.map_or(v, |m| m.min(v)));
        actual_max = Some(actual_max.map_or(v, |m| m.max(v)));
        if min.is_some_and(|lo| v < lo) {
            below_min_count += 1;
        }
        if max.is_some_and(|hi| v > hi) {
            above_max_count += 1;
        }
    }

    let valid = below_min_count == 0 && above_max_count == 0;
    if valid {
        log::info!("All values of '{column}' are within the expected range");
    } else {
        log::warn!(
            "'{column}' has {} values out of range",
            below_min_count + above_max_count
        );
    }

    Ok(RangeValidation {
        column: column.to_string(),
        actual_min,
        actual_max,
        expected_min: min,
        expected_max: max,
        below_min_count,
        above_max_count,
        valid,
    })
}

/// Run [`validate_ranges`] over a range table, skipping absent columns
pub fn validate_configured_ranges(
    batch: &RecordBatch,
    ranges: &BTreeMap<String, (f64, f64)>,
) -> Result<Vec<RangeValidation>> {
    ranges
        .iter()
        .filter(|(column, _)| {
            let present = column_index(batch, column).is_some();
            if !present {
                log::debug!("Range column '{column}' not present, skipping");
            }
            present
        })
        .map(|(column, (min, max))| validate_ranges(batch, column, Some(*min), Some(*max)))
        .collect()
}

/// Null diagnostics of one critical column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalColumnStatus {
    pub column: String,
    pub present: bool,
    pub null_count: usize,
}

impl CriticalColumnStatus {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.present && self.null_count == 0
    }
}

/// Outcome of the critical-column check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalColumnsReport {
    pub valid: bool,
    pub columns: Vec<CriticalColumnStatus>,
}

/// Verify that every critical column exists and has no nulls
#[must_use]
pub fn validate_critical_columns(batch: &RecordBatch, critical: &[String]) -> CriticalColumnsReport {
    let columns: Vec<CriticalColumnStatus> = critical
        .iter()
        .map(|column| {
            let status = match column_index(batch, column) {
                Some(idx) => CriticalColumnStatus {
                    column: column.clone(),
                    present: true,
                    null_count: batch.column(idx).null_count(),
                },
                None => CriticalColumnStatus {
                    column: column.clone(),
                    present: false,
                    null_count: 0,
                },
            };

            if !status.present {
                log::warn!("Critical column '{column}' not found");
            } else if status.null_count > 0 {
                log::warn!("Critical column '{column}' has {} nulls", status.null_count);
            }
            status
        })
        .collect();

    CriticalColumnsReport {
        valid: columns.iter().all(CriticalColumnStatus::is_valid),
        columns,
    }
}

/// Column presence compared with the expected column list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    /// Expected columns absent from the batch
    pub missing: Vec<String>,
    /// Batch columns not in the expected list
    pub unexpected: Vec<String>,
}

impl SchemaDrift {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Compare the columns of a batch with the expected list
#[must_use]
pub fn check_schema_drift(batch: &RecordBatch, expected: &[String]) -> SchemaDrift {
    let schema = batch.schema();
    let missing = expected
        .iter()
        .filter(|c| schema.index_of(c).is_err())
        .cloned()
        .collect();
    let unexpected = schema
        .fields()
        .iter()
        .map(|f| f.name())
        .filter(|name| !expected.contains(name))
        .cloned()
        .collect();

    let drift = SchemaDrift { missing, unexpected };
    if !drift.is_empty() {
        log::warn!(
            "Schema drift: missing {:?}, unexpected {:?}",
            drift.missing,
            drift.unexpected
        );
    }
    drift
}
