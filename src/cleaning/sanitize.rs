//! Structural sanitization: stray double quotes in names and cells.
//!
//! Runs first. Quote characters left in place would corrupt the numeric
//! and date parsing further down, so the later coercers refuse batches
//! that do not carry the marker set here.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;

use crate::common::BatchTransform;
use crate::error::{EtlError, Result};
use crate::schema::adapt::{ColumnRepr, to_string_array};
use crate::schema::{SANITIZED_MARKER, mark_stage};
use crate::utils::arrow::{map_strings, rebuild_batch, rename_columns};

/// Remove literal `"` characters from a string
#[must_use]
pub fn strip_quotes(s: &str) -> String {
    s.replace('"', "")
}

fn strip_column(array: &ArrayRef) -> ArrayRef {
    match ColumnRepr::of(array) {
        ColumnRepr::Text(text) => {
            if text.value_data().contains(&b'"') {
                Arc::new(map_strings(text, |s| Some(strip_quotes(s))))
            } else {
                Arc::clone(array)
            }
        }
        ColumnRepr::OtherText(_) => {
            let text = to_string_array(array);
            Arc::new(map_strings(&text, |s| Some(strip_quotes(s))))
        }
        _ => Arc::clone(array),
    }
}

/// Strip double quotes from every column name and every text cell
///
/// Fails when two column names collide once their quotes are removed.
pub fn clean_quotes_global(batch: &RecordBatch) -> Result<RecordBatch> {
    let renamed = rename_columns(batch, strip_quotes)?;

    let mut seen = FxHashSet::default();
    for field in renamed.schema().fields() {
        if !seen.insert(field.name().clone()) {
            return Err(EtlError::Validation(format!(
                "column name '{}' is duplicated after removing quotes",
                field.name()
            )));
        }
    }

    let columns: Vec<ArrayRef> = renamed.columns().iter().map(strip_column).collect();

    // Large and view strings come back as Utf8
    let schema = renamed.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .zip(&columns)
        .map(|(f, c)| f.as_ref().clone().with_data_type(c.data_type().clone()))
        .collect();
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

    let cleaned = rebuild_batch(schema, columns, renamed.num_rows())?;
    mark_stage(&cleaned, SANITIZED_MARKER)
}

/// Stage wrapper for [`clean_quotes_global`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralSanitizer;

impl BatchTransform for StructuralSanitizer {
    fn name(&self) -> &'static str {
        "structural_sanitizer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let cleaned = clean_quotes_global(&batch)?;
        log::info!("Removed stray quotes from {} columns", cleaned.num_columns());
        Ok(cleaned)
    }
}
