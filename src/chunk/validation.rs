//! Input path validation.

use crate::error::{LinemillError, Result};
use std::fs::File;
use std::path::Path;

/// Validate that a path points at a readable regular file before mapping it.
///
/// Performed eagerly so that a bad path fails the call that starts a run
/// instead of surfacing mid-stream. An empty file is valid input; it simply
/// produces no chunks.
pub fn validate_input_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(LinemillError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| LinemillError::file_error("Failed to read file metadata", e))?;

    if !metadata.is_file() {
        return Err(LinemillError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    // Verify read permission up front; the planner re-opens for mapping.
    File::open(path).map_err(|e| LinemillError::file_error("Cannot open file for reading", e))?;

    Ok(())
}
