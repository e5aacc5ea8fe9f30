//! Logging and progress helpers

pub mod log;
pub mod progress;

pub use self::log::{log_batch_shape, log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_bytes_progress_bar, create_spinner, finish_progress_bar};
