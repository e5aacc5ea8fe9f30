//! Column roles, stage markers and schema unification.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::config::PipelineConfig;
use crate::error::{EtlError, Result};
use crate::utils::arrow::with_schema_metadata;

pub mod adapt;

pub use adapt::{ColumnRepr, ColumnRole};

/// Schema metadata key set once structural sanitization has run
pub const SANITIZED_MARKER: &str = "cadastral_etl.sanitized";

/// Record in the batch itself that a stage has run
pub fn mark_stage(batch: &RecordBatch, marker: &str) -> Result<RecordBatch> {
    with_schema_metadata(batch, marker, "true")
}

/// Whether the batch carries a stage marker
#[must_use]
pub fn has_stage(batch: &RecordBatch, marker: &str) -> bool {
    batch
        .schema()
        .metadata()
        .get(marker)
        .is_some_and(|v| v == "true")
}

/// Fail with a precondition error unless the batch carries the marker
pub fn require_stage(batch: &RecordBatch, marker: &str, stage: &str) -> Result<()> {
    if has_stage(batch, marker) {
        Ok(())
    } else {
        Err(EtlError::precondition(
            stage,
            format!("batch has not been through the stage that sets '{marker}'"),
        ))
    }
}

/// Semantic role of a column according to the configuration
#[must_use]
pub fn role_of(config: &PipelineConfig, column: &str) -> ColumnRole {
    let names = &config.names;
    if column == names.identifier {
        ColumnRole::Identifier
    } else if config.numeric_columns.iter().any(|c| c == column) {
        ColumnRole::Numeric
    } else if config.date_columns.iter().chain(&config.date_feature_columns).any(|c| c == column) {
        ColumnRole::Date
    } else if [&names.municipality, &names.department, &names.registry_office]
        .iter()
        .any(|c| *c == column)
    {
        ColumnRole::Categorical
    } else {
        ColumnRole::FreeText
    }
}

/// Rank of a type on the widening ladder `Null < Int64 < Float64 < Utf8`
fn widening_rank(data_type: &DataType) -> Option<u8> {
    match data_type {
        DataType::Null => Some(0),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => Some(1),
        DataType::Float32 | DataType::Float64 => Some(2),
        DataType::Utf8 => Some(3),
        _ => None,
    }
}

fn widen(a: &DataType, b: &DataType) -> DataType {
    if a == b {
        return a.clone();
    }
    match (widening_rank(a), widening_rank(b)) {
        (Some(0), _) => b.clone(),
        (_, Some(0)) => a.clone(),
        (Some(1), Some(1)) => DataType::Int64,
        (Some(ra), Some(rb)) if ra.max(rb) == 2 => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Compute a common schema for batches with the same column names
///
/// Columns are matched by name in the order of the first batch; a column
/// missing from any batch is an error.
pub fn unify_schemas(batches: &[RecordBatch]) -> Result<SchemaRef> {
    let first = batches
        .first()
        .ok_or_else(|| EtlError::Validation("no batches to unify".to_string()))?;
    let first_schema = first.schema();

    let mut fields = Vec::with_capacity(first_schema.fields().len());
    for field in first_schema.fields() {
        let mut data_type = field.data_type().clone();
        for batch in &batches[1..] {
            let other = batch.schema();
            let other_field = other
                .field_with_name(field.name())
                .map_err(|_| EtlError::column_not_found(field.name()))?;
            data_type = widen(&data_type, other_field.data_type());
        }
        fields.push(Field::new(field.name(), data_type, true));
    }

    for batch in &batches[1..] {
        if batch.num_columns() != fields.len() {
            return Err(EtlError::Validation(format!(
                "batch has {} columns, expected {}",
                batch.num_columns(),
                fields.len()
            )));
        }
    }

    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        first_schema.metadata().clone(),
    )))
}

/// Cast a batch to a target schema, matching columns by name
pub fn cast_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let column = batch
                .column_by_name(field.name())
                .ok_or_else(|| EtlError::column_not_found(field.name()))?;
            if column.data_type() == field.data_type() {
                Ok(Arc::clone(column))
            } else {
                Ok(cast(column, field.data_type())?)
            }
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    crate::utils::arrow::rebuild_batch(Arc::clone(schema), columns, batch.num_rows())
}

/// Widen all batches to one schema and concatenate them
pub fn unify_batches(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let schema = unify_schemas(batches)?;
    let cast = batches
        .iter()
        .map(|b| cast_to_schema(b, &schema))
        .collect::<Result<Vec<_>>>()?;
    Ok(concat_batches(&schema, &cast)?)
}
