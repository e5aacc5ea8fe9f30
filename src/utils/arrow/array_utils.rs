//! Utilities for working with Arrow record batches.
//!
//! Column lookup, replacement and removal that keep the schema metadata
//! intact, plus a few string-array builders shared by the stages.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, StringArray, StringBuilder};
use arrow::compute::filter as arrow_filter;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{EtlError, Result};

/// Index of a column, if present
#[must_use]
pub fn column_index(batch: &RecordBatch, column: &str) -> Option<usize> {
    batch.schema().index_of(column).ok()
}

/// Get a required column from a record batch
pub fn get_column<'a>(batch: &'a RecordBatch, column: &str) -> Result<&'a ArrayRef> {
    column_index(batch, column)
        .map(|idx| batch.column(idx))
        .ok_or_else(|| EtlError::column_not_found(column))
}

/// Rebuild a record batch from a schema and columns, keeping the row count
/// even when no column is left.
pub fn rebuild_batch(schema: SchemaRef, columns: Vec<ArrayRef>, num_rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Replace a column in place, adopting the data type of the new array
///
/// The field keeps its position and its metadata, the schema keeps its
/// metadata.
pub fn replace_column(batch: &RecordBatch, column: &str, array: ArrayRef) -> Result<RecordBatch> {
    let idx = column_index(batch, column).ok_or_else(|| EtlError::column_not_found(column))?;
    let schema = batch.schema();

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i == idx {
                Field::new(f.name(), array.data_type().clone(), true)
                    .with_metadata(f.metadata().clone())
            } else {
                f.as_ref().clone()
            }
        })
        .collect();

    let mut columns = batch.columns().to_vec();
    columns[idx] = array;

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    rebuild_batch(schema, columns, batch.num_rows())
}

/// Replace a column if it exists, otherwise append it at the end
pub fn upsert_column(batch: &RecordBatch, column: &str, array: ArrayRef) -> Result<RecordBatch> {
    if column_index(batch, column).is_some() {
        return replace_column(batch, column, array);
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(column, array.data_type().clone(), true));

    let mut columns = batch.columns().to_vec();
    columns.push(array);

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    rebuild_batch(schema, columns, batch.num_rows())
}

/// Drop the listed columns that are present; absent names are ignored.
///
/// Returns the new batch and the names that were actually dropped.
pub fn drop_columns(batch: &RecordBatch, columns: &[String]) -> Result<(RecordBatch, Vec<String>)> {
    let schema = batch.schema();
    let mut dropped = Vec::new();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut arrays = Vec::with_capacity(schema.fields().len());

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        if columns.iter().any(|c| c == field.name()) {
            dropped.push(field.name().clone());
        } else {
            fields.push(field.as_ref().clone());
            arrays.push(Arc::clone(array));
        }
    }

    if dropped.is_empty() {
        return Ok((batch.clone(), dropped));
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    Ok((rebuild_batch(schema, arrays, batch.num_rows())?, dropped))
}

/// Rename every column with the given function
pub fn rename_columns(batch: &RecordBatch, rename: impl Fn(&str) -> String) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_name(rename(f.name())))
        .collect();

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    rebuild_batch(schema, batch.columns().to_vec(), batch.num_rows())
}

/// Set a key in the schema metadata
pub fn with_schema_metadata(batch: &RecordBatch, key: &str, value: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut metadata: HashMap<String, String> = schema.metadata().clone();
    metadata.insert(key.to_string(), value.to_string());

    let schema = Arc::new(Schema::new_with_metadata(
        schema.fields().clone(),
        metadata,
    ));
    rebuild_batch(schema, batch.columns().to_vec(), batch.num_rows())
}

/// Filter a record batch based on a boolean mask
///
/// # Arguments
/// * `batch` - The record batch to filter
/// * `mask` - The boolean mask indicating which rows to keep
///
/// # Returns
/// A new record batch with only rows where mask is true
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(EtlError::Validation(format!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        )));
    }

    let filtered_columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| arrow_filter(col, mask))
        .collect::<arrow::error::Result<_>>()?;

    let kept = mask.true_count();
    rebuild_batch(batch.schema(), filtered_columns, kept)
}

/// Map every non-null value of a string array; `None` from the closure
/// produces a null.
pub fn map_strings(array: &StringArray, mut f: impl FnMut(&str) -> Option<String>) -> StringArray {
    let mut builder = StringBuilder::with_capacity(array.len(), array.value_data().len());
    for value in array.iter() {
        match value.and_then(&mut f) {
            Some(v) => builder.append_value(v),
            None => builder.append_null(),
        }
    }
    builder.finish()
}

/// Like [`map_strings`] but also sees nulls, so it can fill them
pub fn map_optional_strings(
    array: &StringArray,
    mut f: impl FnMut(Option<&str>) -> Option<String>,
) -> StringArray {
    let mut builder = StringBuilder::with_capacity(array.len(), array.value_data().len());
    for value in array.iter() {
        match f(value) {
            Some(v) => builder.append_value(v),
            None => builder.append_null(),
        }
    }
    builder.finish()
}
