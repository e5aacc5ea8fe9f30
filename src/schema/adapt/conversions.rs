//! Non-strict conversions between array types.
//!
//! A value that cannot be represented in the target type becomes null; a
//! conversion never fails the batch.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray, new_null_array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};

use crate::schema::adapt::types::ColumnRepr;

/// Cast with Arrow, falling back to an all-null array of the target type
fn lossy_cast(array: &ArrayRef, target: &DataType) -> ArrayRef {
    cast(array, target).unwrap_or_else(|e| {
        log::debug!(
            "Cast from {:?} to {target:?} failed ({e}), producing nulls",
            array.data_type()
        );
        new_null_array(target, array.len())
    })
}

/// Parse a float from text, treating non-finite results as missing
#[must_use]
pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer from text; a float literal is truncated
#[must_use]
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| parse_float(s).and_then(float_to_int))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn float_to_int(v: f64) -> Option<i64> {
    let in_range = v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64;
    in_range.then(|| v.trunc() as i64)
}

/// Coerce any column to `Utf8`
///
/// Text passes through, numbers, booleans and dates are rendered, and any
/// value the type system cannot render becomes null.
#[must_use]
pub fn to_text(array: &ArrayRef) -> ArrayRef {
    match ColumnRepr::of(array) {
        ColumnRepr::Text(_) => Arc::clone(array),
        ColumnRepr::OtherText(a)
        | ColumnRepr::Integer(a)
        | ColumnRepr::Float(a)
        | ColumnRepr::Temporal(a)
        | ColumnRepr::Other(a) => lossy_cast(a, &DataType::Utf8),
        ColumnRepr::Boolean(_) => lossy_cast(array, &DataType::Utf8),
        ColumnRepr::Null(len) => new_null_array(&DataType::Utf8, len),
    }
}

/// Coerce a column to `Utf8` and hand back the concrete array
#[must_use]
pub fn to_string_array(array: &ArrayRef) -> StringArray {
    to_text(array).as_string::<i32>().clone()
}

/// Coerce any column to `Float64`
///
/// Text is parsed after trimming; unparseable text, dates and nested
/// types become null, as do non-finite values.
#[must_use]
pub fn to_float64(array: &ArrayRef) -> ArrayRef {
    let floats: ArrayRef = match ColumnRepr::of(array) {
        ColumnRepr::Float(a) | ColumnRepr::Integer(a) => lossy_cast(a, &DataType::Float64),
        ColumnRepr::Boolean(_) => lossy_cast(array, &DataType::Float64),
        ColumnRepr::Text(s) => Arc::new(parse_floats(s)),
        ColumnRepr::OtherText(a) => {
            let utf8 = lossy_cast(a, &DataType::Utf8);
            Arc::new(parse_floats(utf8.as_string::<i32>()))
        }
        ColumnRepr::Temporal(a) | ColumnRepr::Other(a) => new_null_array(&DataType::Float64, a.len()),
        ColumnRepr::Null(len) => new_null_array(&DataType::Float64, len),
    };

    let floats = floats.as_primitive::<Float64Type>();
    if floats.iter().flatten().all(f64::is_finite) {
        return Arc::new(floats.clone());
    }
    Arc::new(
        floats
            .iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect::<Float64Array>(),
    )
}

/// Parse a string array into floats, non-strict
#[must_use]
pub fn parse_floats(array: &StringArray) -> Float64Array {
    array.iter().map(|v| v.and_then(parse_float)).collect()
}

/// Coerce any column to `Int64`
///
/// Floats and float literals are truncated toward zero.
#[must_use]
pub fn to_int64(array: &ArrayRef) -> Int64Array {
    match ColumnRepr::of(array) {
        ColumnRepr::Integer(a) => lossy_cast(a, &DataType::Int64)
            .as_primitive::<Int64Type>()
            .clone(),
        ColumnRepr::Boolean(_) => lossy_cast(array, &DataType::Int64)
            .as_primitive::<Int64Type>()
            .clone(),
        ColumnRepr::Float(a) => lossy_cast(a, &DataType::Float64)
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.and_then(float_to_int))
            .collect(),
        ColumnRepr::Text(s) => s.iter().map(|v| v.and_then(parse_int)).collect(),
        ColumnRepr::OtherText(a) => lossy_cast(a, &DataType::Utf8)
            .as_string::<i32>()
            .iter()
            .map(|v| v.and_then(parse_int))
            .collect(),
        ColumnRepr::Temporal(a) | ColumnRepr::Other(a) => Int64Array::new_null(a.len()),
        ColumnRepr::Null(len) => Int64Array::new_null(len),
    }
}
