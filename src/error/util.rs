//! Utility functions for error handling
//!
//! File access helpers that attach the path and purpose to IO failures.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{EtlError, Result};

/// Open a file for reading with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
///
/// # Returns
/// * `Result<fs::File>` - The opened file or an error carrying the path
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(EtlError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found (needed for: {purpose})"),
            ),
        ));
    }

    if !path.is_file() {
        return Err(EtlError::io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a file (expected a file for: {purpose})"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let kind = e.kind();
        let context = match kind {
            io::ErrorKind::PermissionDenied => "permission denied - check file permissions".to_string(),
            io::ErrorKind::NotFound => {
                "file not found - it may have been deleted during operation".to_string()
            }
            _ => format!("failed to open file for: {purpose}: {e}"),
        };
        EtlError::io(path, io::Error::new(kind, context))
    })
}

/// Create a file for writing, creating missing parent directories first
pub fn safe_create_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }
    }

    fs::File::create(path).map_err(|e| {
        let kind = e.kind();
        EtlError::io(
            path,
            io::Error::new(kind, format!("failed to create file for: {purpose}: {e}")),
        )
    })
}
