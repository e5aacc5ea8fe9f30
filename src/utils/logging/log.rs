//! Logging helpers
//!
//! Consistent messages for file operations and batch summaries.

use std::path::Path;
use std::time::Duration;

use arrow::record_batch::RecordBatch;

/// Log the start of an operation on a file
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the file being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation} {}", path.display());
}

/// Log the completion of an operation on a file
///
/// # Arguments
/// * `operation` - Past-tense description of the operation
/// * `path` - Path of the file that was operated on
/// * `rows` - Number of rows processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "{operation} {rows} rows ({}) in {duration:?}",
            path.display()
        ),
        None => log::info!("{operation} {rows} rows ({})", path.display()),
    }
}

/// Log a warning, optionally tied to a file
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{message}: {}", path.display());
    } else {
        log::warn!("{message}");
    }
}

/// Log the shape of a batch at debug level
pub fn log_batch_shape(label: &str, batch: &RecordBatch) {
    log::debug!(
        "{label}: {} rows x {} columns",
        batch.num_rows(),
        batch.num_columns()
    );
}
