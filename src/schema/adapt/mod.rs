//! Module for coercing columns between physical representations.

pub mod conversions;
pub mod date_utils;
pub mod types;

// Re-export the main types and functions for easier access
pub use conversions::{parse_float, parse_int, to_float64, to_int64, to_string_array, to_text};
pub use date_utils::{
    CANONICAL_DATE_FORMAT, DATE_CASCADE, DateFormat, DateOrder, detect_date_format,
    format_canonical, is_canonical, parse_date_string,
};
pub use types::{ColumnRepr, ColumnRole};
