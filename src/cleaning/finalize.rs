//! Final null handling and deduplication.
//!
//! Nulls are handled in two tiers: a per-column sentinel table first, then a
//! general strategy over whatever is left. Deduplication runs last.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, Scalar, StringArray};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{and, cast, is_not_null, is_null};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::common::BatchTransform;
use crate::config::{NullStrategy, PipelineConfig};
use crate::error::Result;
use crate::schema::adapt::{ColumnRepr, to_string_array};
use crate::utils::arrow::{column_index, filter_record_batch, map_optional_strings, replace_column};

/// Literal texts treated as missing by the default fills (compared lowercase)
pub const MISSING_LITERALS: [&str; 4] = ["null", "none", "nan", "n/a"];

/// Whether a text value counts as missing for the default fills
#[must_use]
pub fn is_missing_literal(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => true,
        Some("") => true,
        Some(v) => MISSING_LITERALS.contains(&v.to_lowercase().as_str()),
    }
}

/// Counts produced by the finalizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    /// Cells replaced by the per-column sentinel table
    pub default_filled: usize,
    /// Cells filled with zero by the `fill` strategy
    pub zero_filled: usize,
    /// Rows removed by the `drop` strategy
    pub rows_dropped_nulls: usize,
    /// Rows removed by deduplication
    pub duplicates_removed: usize,
}

/// Apply the per-column sentinel table
///
/// Nulls, blank values and the literals `null`, `none`, `nan` and `n/a`
/// (any case) are replaced. Columns of the table absent from the batch are
/// ignored.
pub fn apply_default_fills(batch: &RecordBatch, fills: &[(String, String)]) -> Result<(RecordBatch, usize)> {
    let mut out = batch.clone();
    let mut replaced = 0;

    for (column, fill) in fills {
        let Some(idx) = column_index(&out, column) else {
            continue;
        };
        let text = to_string_array(out.column(idx));
        let filled = map_optional_strings(&text, |v| {
            if is_missing_literal(v) {
                replaced += 1;
                Some(fill.clone())
            } else {
                v.map(str::to_string)
            }
        });
        out = replace_column(&out, column, Arc::new(filled))?;
    }

    Ok((out, replaced))
}

/// Zero of a column's own type as a one-element scalar
fn zero_like(array: &ArrayRef) -> Result<Scalar<ArrayRef>> {
    let zero: ArrayRef = match ColumnRepr::of(array) {
        ColumnRepr::Text(_) => Arc::new(StringArray::from(vec!["0"])),
        _ => cast(&Int64Array::from(vec![0]), array.data_type())?,
    };
    Ok(Scalar::new(zero))
}

/// Replace the nulls of every eligible column with zero
///
/// Numeric and boolean columns get a typed zero, text columns get `"0"`.
/// Columns listed in `keep_null` (date text) and columns of temporal,
/// untyped or nested types keep their nulls.
pub fn fill_nulls_with_zero(batch: &RecordBatch, keep_null: &[String]) -> Result<(RecordBatch, usize)> {
    let mut out = batch.clone();
    let mut filled = 0;
    let schema = batch.schema();

    for (idx, field) in schema.fields().iter().enumerate() {
        let array = batch.column(idx);
        if array.null_count() == 0 || keep_null.iter().any(|c| c == field.name()) {
            continue;
        }
        let eligible = matches!(
            ColumnRepr::of(array),
            ColumnRepr::Text(_) | ColumnRepr::Integer(_) | ColumnRepr::Float(_) | ColumnRepr::Boolean(_)
        );
        if !eligible {
            continue;
        }

        let mask = is_null(array.as_ref())?;
        let zero = zero_like(array)?;
        let replaced = zip(&mask, &zero, array)?;
        filled += array.null_count();
        out = replace_column(&out, field.name(), replaced)?;
    }

    Ok((out, filled))
}

/// Remove rows with a null in any of the critical columns present
pub fn drop_null_rows(batch: &RecordBatch, critical: &[String]) -> Result<RecordBatch> {
    let mut mask = BooleanArray::from(vec![true; batch.num_rows()]);
    for column in critical {
        match column_index(batch, column) {
            Some(idx) => mask = and(&mask, &is_not_null(batch.column(idx).as_ref())?)?,
            None => log::warn!("Critical column '{column}' not present, not used for dropping"),
        }
    }
    filter_record_batch(batch, &mask)
}

/// Keep the first row of every distinct key
///
/// The key is the identifier column when present, the full row otherwise.
/// A null identifier is a key value of its own.
pub fn remove_duplicates(batch: &RecordBatch, identifier: Option<&str>) -> Result<RecordBatch> {
    if batch.num_rows() == 0 {
        return Ok(batch.clone());
    }

    let key_columns: Vec<ArrayRef> = match identifier.and_then(|id| column_index(batch, id)) {
        Some(idx) => vec![Arc::clone(batch.column(idx))],
        None => batch.columns().to_vec(),
    };
    if key_columns.is_empty() {
        return Ok(batch.clone());
    }

    let converter = RowConverter::new(
        key_columns
            .iter()
            .map(|c| SortField::new(c.data_type().clone()))
            .collect(),
    )?;
    let rows = converter.convert_columns(&key_columns)?;

    let mut seen = FxHashSet::default();
    let mask: BooleanArray = rows.iter().map(|row| Some(seen.insert(row))).collect();
    if mask.true_count() == batch.num_rows() {
        return Ok(batch.clone());
    }
    filter_record_batch(batch, &mask)
}

/// Null and duplicate finalizer stage
#[derive(Debug, Clone)]
pub struct Finalizer {
    default_fills: Vec<(String, String)>,
    strategy: NullStrategy,
    critical_columns: Vec<String>,
    date_columns: Vec<String>,
    identifier: String,
}

impl Finalizer {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut date_columns = config.date_columns.clone();
        for column in &config.date_feature_columns {
            if !date_columns.contains(column) {
                date_columns.push(column.clone());
            }
        }

        Self {
            default_fills: config.default_fills.clone(),
            strategy: config.null_strategy,
            critical_columns: config.critical_columns.clone(),
            date_columns,
            identifier: config.names.identifier.clone(),
        }
    }

    /// Use another general null strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: NullStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Run both null tiers and deduplication
    pub fn finalize(&self, batch: &RecordBatch) -> Result<(RecordBatch, FinalizeReport)> {
        let mut report = FinalizeReport::default();

        let (mut out, default_filled) = apply_default_fills(batch, &self.default_fills)?;
        report.default_filled = default_filled;

        match self.strategy {
            NullStrategy::Fill => {
                let (filled, count) = fill_nulls_with_zero(&out, &self.date_columns)?;
                report.zero_filled = count;
                out = filled;
            }
            NullStrategy::Drop => {
                let before = out.num_rows();
                out = drop_null_rows(&out, &self.critical_columns)?;
                report.rows_dropped_nulls = before - out.num_rows();
            }
            NullStrategy::Report => {
                let remaining: usize = out.columns().iter().map(|c| c.null_count()).sum();
                log::info!("{remaining} nulls left in place (report strategy)");
            }
        }

        let before = out.num_rows();
        out = remove_duplicates(&out, Some(&self.identifier))?;
        report.duplicates_removed = before - out.num_rows();

        log::info!(
            "Finalized batch: {} default fills, {} zero fills, {} rows dropped, {} duplicates removed",
            report.default_filled,
            report.zero_filled,
            report.rows_dropped_nulls,
            report.duplicates_removed
        );
        Ok((out, report))
    }
}

impl BatchTransform for Finalizer {
    fn name(&self) -> &'static str {
        "finalizer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.finalize(&batch).map(|(out, _)| out)
    }
}
