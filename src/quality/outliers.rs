//! Outlier detection with IQR fences or z-scores.

use std::sync::Arc;

use arrow::array::{AsArray, Int8Array};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::config::OutlierMethod;
use crate::error::Result;
use crate::schema::adapt::to_float64;
use crate::utils::arrow::{get_column, upsert_column};

/// Result of one outlier detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierSummary {
    pub column: String,
    pub method: OutlierMethod,
    pub threshold: f64,
    /// Lower fence, `None` when the column has too few values
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub outlier_count: usize,
    pub outlier_pct: f64,
}

/// Name of the indicator column appended for `column`
#[must_use]
pub fn outlier_column_name(column: &str) -> String {
    format!("{column}_OUTLIER")
}

/// Nearest-rank quantile of sorted values
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted.get(rank.min(sorted.len() - 1)).copied()
}

/// Mean and sample standard deviation (n - 1)
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Fences outside which a value is an outlier
fn fences(values: &[f64], method: OutlierMethod, threshold: f64) -> Option<(f64, f64)> {
    match method {
        OutlierMethod::Iqr => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let q1 = quantile(&sorted, 0.25)?;
            let q3 = quantile(&sorted, 0.75)?;
            let iqr = q3 - q1;
            Some((q1 - threshold * iqr, q3 + threshold * iqr))
        }
        OutlierMethod::ZScore => {
            let (mean, std) = mean_and_std(values)?;
            // A constant column has no outliers
            (std.is_finite() && std > 0.0).then(|| (mean - threshold * std, mean + threshold * std))
        }
    }
}

/// Flag the outliers of a numeric column
///
/// Appends `<column>_OUTLIER` as `Int8` (1 outlier, 0 not, null where the
/// value is null) and returns a summary of the run.
///
/// # Arguments
/// * `batch` - The batch holding the column
/// * `column` - Column to check, coerced to float non-strictly
/// * `method` - IQR fences or z-score
/// * `threshold` - IQR multiplier or z-score cut-off
///
/// # Errors
/// Returns an error if the column does not exist
#[allow(clippy::cast_precision_loss)]
pub fn detect_outliers(
    batch: &RecordBatch,
    column: &str,
    method: OutlierMethod,
    threshold: f64,
) -> Result<(RecordBatch, OutlierSummary)> {
    let values = to_float64(get_column(batch, column)?);
    let values = values.as_primitive::<Float64Type>();
    let present: Vec<f64> = values.iter().flatten().collect();

    let bounds = fences(&present, method, threshold);
    let flags: Int8Array = values
        .iter()
        .map(|v| {
            v.map(|v| match bounds {
                Some((lower, upper)) => i8::from(v < lower || v > upper),
                None => 0,
            })
        })
        .collect();

    let outlier_count = flags.iter().flatten().filter(|f| *f == 1).count();
    let outlier_pct = if batch.num_rows() == 0 {
        0.0
    } else {
        outlier_count as f64 / batch.num_rows() as f64 * 100.0
    };
    log::info!("Outliers in '{column}' ({method}): {outlier_count} ({outlier_pct:.2}%)");

    let out = upsert_column(batch, &outlier_column_name(column), Arc::new(flags))?;
    let summary = OutlierSummary {
        column: column.to_string(),
        method,
        threshold,
        lower_bound: bounds.map(|(l, _)| l),
        upper_bound: bounds.map(|(_, u)| u),
        outlier_count,
        outlier_pct,
    };
    Ok((out, summary))
}
