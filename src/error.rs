//! Error types for linemill.
//!
//! A single `thiserror` enum covers every fatal condition the pipeline can
//! hit: file access, chunk-boundary search, and worker-task failures.
//! Cancellation is deliberately not represented here; a cancelled run simply
//! ends its result stream.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for linemill operations.
///
/// Every variant is run-fatal: once one is yielded through a result stream,
/// the stream ends. Results delivered before the fault remain valid.
#[derive(Error, Debug)]
pub enum LinemillError {
    /// File system related errors (open, metadata, memory mapping, read)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {}", .path.display())]
    NotAFile { path: PathBuf },

    /// No line terminator found within the bounded grow-and-retry window
    /// while searching for a chunk boundary. Indicates a single line longer
    /// than every retried window.
    #[error("no line terminator within {window} bytes at offset {offset}")]
    BoundaryNotFound { offset: u64, window: u64 },

    /// A worker task panicked, usually inside the user-supplied per-line
    /// function. Aborts the whole run.
    #[error("worker task panicked: {message}")]
    WorkerPanic { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for linemill operations.
pub type Result<T> = std::result::Result<T, LinemillError>;

impl LinemillError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a BoundaryNotFound for the given search position
    pub fn boundary_not_found(offset: u64, window: u64) -> Self {
        Self::BoundaryNotFound { offset, window }
    }

    /// Create a WorkerPanic with a descriptive message
    pub fn worker_panic(message: impl Into<String>) -> Self {
        Self::WorkerPanic {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

// Automatic conversion from io::Error to LinemillError
impl From<std::io::Error> for LinemillError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
