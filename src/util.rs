//! Utility functions for refrain.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{RefrainError, Result};

/// Maximum file size that can be read into memory (10 MB).
///
/// Guideline files and the state file are expected to stay far below this.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing files over `MAX_FILE_SIZE`.
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string, refusing files over `max_size` bytes.
///
/// # Errors
///
/// Returns a storage error if the file cannot be read or is too large.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| RefrainError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(RefrainError::storage(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file is too large ({} bytes, max {} bytes)", size, max_size),
            ),
        ));
    }

    fs::read_to_string(path).map_err(|e| RefrainError::storage(path, e))
}

/// Title-case an identifier for display: `guideline_code_style` becomes
/// `Guideline Code Style`.
pub fn display_name(id: &str) -> String {
    id.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
