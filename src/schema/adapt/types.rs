//! Physical representations a column can arrive in.
//!
//! Every coercion dispatches once over [`ColumnRepr`] and handles each
//! variant explicitly, instead of inspecting data types inside each stage.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray};
use arrow::datatypes::DataType;

/// The closed set of source representations a coercion handles
#[derive(Debug, Clone, Copy)]
pub enum ColumnRepr<'a> {
    /// `Utf8` text
    Text(&'a StringArray),
    /// Text stored in another string layout (`LargeUtf8`, `Utf8View`)
    OtherText(&'a ArrayRef),
    /// Any signed or unsigned integer
    Integer(&'a ArrayRef),
    /// Any floating point width
    Float(&'a ArrayRef),
    /// Booleans
    Boolean(&'a BooleanArray),
    /// Already-typed dates and timestamps
    Temporal(&'a ArrayRef),
    /// Untyped all-null column
    Null(usize),
    /// Anything else (lists, structs, binary)
    Other(&'a ArrayRef),
}

impl<'a> ColumnRepr<'a> {
    /// Classify an array by its physical type
    #[must_use]
    pub fn of(array: &'a ArrayRef) -> Self {
        match array.data_type() {
            DataType::Utf8 => Self::Text(array.as_string::<i32>()),
            DataType::LargeUtf8 | DataType::Utf8View => Self::OtherText(array),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer(array),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Self::Float(array),
            DataType::Boolean => Self::Boolean(array.as_boolean()),
            DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => Self::Temporal(array),
            DataType::Null => Self::Null(array.len()),
            _ => Self::Other(array),
        }
    }

    /// Short label used in logs and reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) | Self::OtherText(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Temporal(_) => "date",
            Self::Null(_) => "null",
            Self::Other(_) => "other",
        }
    }

    /// Whether the column holds numbers
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }
}

/// Semantic role of a column, fixed by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Primary key
    Identifier,
    /// Controlled vocabulary (municipality, department, registry office)
    Categorical,
    /// Numbers and amounts
    Numeric,
    /// Date-like text
    Date,
    /// Everything else
    FreeText,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Identifier => "identifier",
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::FreeText => "free-text",
        };
        f.write_str(label)
    }
}
