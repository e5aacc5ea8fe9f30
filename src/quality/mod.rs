//! Data-quality checks over a batch.
//!
//! Nothing here corrects the data. Issues are reported as counts and flags;
//! the only check that changes the batch is outlier detection, which appends
//! one indicator column.

pub mod outliers;
pub mod validation;

use std::fmt;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use itertools::Itertools;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::Result;
use crate::utils::arrow::column_index;

pub use outliers::{OutlierSummary, detect_outliers};
pub use validation::{
    CriticalColumnsReport, RangeValidation, SchemaDrift, check_schema_drift,
    validate_configured_ranges, validate_critical_columns, validate_ranges,
};

/// Number of null columns listed in the rendered report
const TOP_NULL_COLUMNS: usize = 10;

/// General quality metrics of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Null count per column, in schema order
    pub null_counts: Vec<(String, usize)>,
    /// Arrow type name per column, in schema order
    pub data_types: Vec<(String, String)>,
    /// Rows minus distinct identifier values; 0 without an identifier column
    pub duplicate_count: usize,
}

/// Number of distinct values of one column; null counts as a value
pub fn distinct_count(array: &ArrayRef) -> Result<usize> {
    let converter = RowConverter::new(vec![SortField::new(array.data_type().clone())])?;
    let rows = converter.convert_columns(std::slice::from_ref(array))?;
    Ok(rows.iter().collect::<FxHashSet<_>>().len())
}

/// Collect row, column, null, type and duplicate metrics
///
/// # Arguments
/// * `batch` - The batch to inspect
/// * `identifier` - Name of the identifier column used for the duplicate count
pub fn validate_data_quality(batch: &RecordBatch, identifier: &str) -> Result<QualityReport> {
    let schema = batch.schema();
    let null_counts = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, c)| (f.name().clone(), c.null_count()))
        .collect();
    let data_types = schema
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().to_string()))
        .collect();

    let duplicate_count = match column_index(batch, identifier) {
        Some(idx) => batch.num_rows() - distinct_count(batch.column(idx))?,
        None => 0,
    };

    log::info!(
        "Quality check: {} rows, {} columns, {duplicate_count} duplicate identifiers",
        batch.num_rows(),
        batch.num_columns()
    );

    Ok(QualityReport {
        total_rows: batch.num_rows(),
        total_columns: batch.num_columns(),
        null_counts,
        data_types,
        duplicate_count,
    })
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

impl QualityReport {
    /// Total nulls across all columns
    #[must_use]
    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|(_, n)| n).sum()
    }

    /// Human-readable report
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);

        writeln!(f, "{rule}")?;
        writeln!(f, "DATA QUALITY REPORT")?;
        writeln!(f, "{rule}")?;

        writeln!(f, "\nDimensions:")?;
        writeln!(f, "   - Rows: {}", self.total_rows)?;
        writeln!(f, "   - Columns: {}", self.total_columns)?;

        writeln!(f, "\nNull values:")?;
        let with_nulls = self
            .null_counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(TOP_NULL_COLUMNS)
            .collect_vec();
        if with_nulls.is_empty() {
            writeln!(f, "   No null values")?;
        }
        for (column, count) in with_nulls {
            writeln!(
                f,
                "   - {column}: {count} ({:.2}%)",
                percent(*count, self.total_rows)
            )?;
        }

        writeln!(f, "\nDuplicates:")?;
        if self.duplicate_count > 0 {
            writeln!(
                f,
                "   {} duplicates ({:.2}%)",
                self.duplicate_count,
                percent(self.duplicate_count, self.total_rows)
            )?;
        } else {
            writeln!(f, "   No duplicates")?;
        }

        writeln!(f, "\nData types:")?;
        let type_counts = self.data_types.iter().map(|(_, t)| t.as_str()).counts();
        for (data_type, count) in type_counts.into_iter().sorted() {
            writeln!(f, "   - {data_type}: {count} columns")?;
        }

        writeln!(f, "{rule}")
    }
}

/// Collect the metrics and render them
pub fn generate_quality_report(batch: &RecordBatch, identifier: &str) -> Result<String> {
    Ok(validate_data_quality(batch, identifier)?.render())
}
