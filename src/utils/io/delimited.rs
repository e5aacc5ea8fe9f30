//! Delimited-text output for human inspection of a snapshot.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};

use crate::error::util::safe_create_file;
use crate::error::{EtlError, Result};
use crate::utils::logging::log_operation_complete;

/// Write batches as CSV with a header row; nulls are empty fields
///
/// Column names come from the first batch.
pub fn write_csv(path: &Path, batches: &[RecordBatch], delimiter: u8) -> Result<usize> {
    let first = batches
        .first()
        .ok_or_else(|| EtlError::Validation("no batches to write".to_string()))?;

    let file = safe_create_file(path, "writing csv output")?;
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(file);
    writer.write_record(first.schema().fields().iter().map(|f| f.name().as_str()))?;

    let options = FormatOptions::default().with_null("");
    let mut rows = 0;
    for batch in batches {
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            writer.write_record(formatters.iter().map(|f| f.value(row).to_string()))?;
        }
        rows += batch.num_rows();
    }

    writer.flush().map_err(|e| EtlError::io(path, e))?;
    log_operation_complete("Wrote", path, rows, None);
    Ok(rows)
}
