//! Progress reporting for long-running reads and writes
//!
//! Built on indicatif. A template that fails to parse falls back to the
//! plain default style instead of aborting the run.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Style of the byte-based bar used while streaming a file
pub const BYTES_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

/// Style of the spinner used when the total is unknown
pub const SPINNER_TEMPLATE: &str = "{spinner:.green} {elapsed_precise} {msg}";

/// Create a progress bar measured in bytes of input consumed
///
/// # Arguments
/// * `total_bytes` - Size of the input file
/// * `description` - Optional initial message
#[must_use]
pub fn create_bytes_progress_bar(total_bytes: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::default_bar()
        .template(BYTES_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }
    pb
}

/// Create a spinner for operations without a known length
#[must_use]
pub fn create_spinner(message: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    if let Some(msg) = message {
        pb.set_message(msg.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    match message {
        Some(msg) => pb.finish_with_message(msg.to_string()),
        None => pb.finish(),
    }
}
