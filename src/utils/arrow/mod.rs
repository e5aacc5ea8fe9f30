//! Arrow utilities
//!
//! Helpers for column lookup, replacement and string mapping on record
//! batches.

pub mod array_utils;

pub use array_utils::{
    column_index, drop_columns, filter_record_batch, get_column, map_optional_strings,
    map_strings, rebuild_batch, rename_columns, replace_column, upsert_column,
    with_schema_metadata,
};
