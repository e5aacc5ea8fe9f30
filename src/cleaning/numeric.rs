//! Numeric coercion of the monetary column and the declared count columns.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::adapt::{ColumnRepr, parse_float, to_float64, to_string_array};
use crate::schema::{SANITIZED_MARKER, require_stage};
use crate::utils::arrow::{column_index, replace_column};

/// Parse a monetary amount such as `"1,250,000"`
///
/// Quotes and thousands separators are removed before parsing. Negative
/// amounts are invalid and give `None`.
#[must_use]
pub fn parse_monetary(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != '"' && *c != ',').collect();
    parse_float(&cleaned).filter(|v| *v >= 0.0)
}

fn coerce_monetary(array: &ArrayRef) -> ArrayRef {
    let values: Float64Array = match ColumnRepr::of(array) {
        ColumnRepr::Text(text) => text.iter().map(|v| v.and_then(parse_monetary)).collect(),
        ColumnRepr::Integer(_) | ColumnRepr::Float(_) | ColumnRepr::Boolean(_) => to_float64(array)
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.filter(|x| *x >= 0.0))
            .collect(),
        _ => to_string_array(array)
            .iter()
            .map(|v| v.and_then(parse_monetary))
            .collect(),
    };
    Arc::new(values)
}

/// Numeric coercer stage
#[derive(Debug, Clone)]
pub struct NumericCoercer {
    monetary_column: String,
    columns: Vec<String>,
}

impl NumericCoercer {
    /// Coerce `columns` to float, applying the monetary rules to `monetary_column`
    #[must_use]
    pub fn new(monetary_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            monetary_column: monetary_column.into(),
            columns,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.names.monetary.clone(), config.numeric_columns.clone())
    }

    /// Cast every declared numeric column present in the batch to `Float64`
    ///
    /// # Errors
    /// Returns a precondition error if the batch has not been sanitized
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        require_stage(batch, SANITIZED_MARKER, self.name())?;

        let mut targets: Vec<&String> = self.columns.iter().collect();
        if !targets.contains(&&self.monetary_column) {
            targets.push(&self.monetary_column);
        }

        let mut out = batch.clone();
        for column in targets {
            let Some(idx) = column_index(&out, column) else {
                continue;
            };

            let array = out.column(idx);
            let before = array.null_count();
            let coerced = if *column == self.monetary_column {
                coerce_monetary(array)
            } else {
                to_float64(array)
            };

            let lost = coerced.null_count().saturating_sub(before);
            if lost > 0 {
                log::debug!("{lost} values of '{column}' could not be read as numbers");
            }
            out = replace_column(&out, column, coerced)?;
        }

        Ok(out)
    }
}

impl BatchTransform for NumericCoercer {
    fn name(&self) -> &'static str {
        "numeric_coercer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}
