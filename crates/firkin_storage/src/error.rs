//! Error types for storage operations.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Every variant names the path of the backend it came from so callers can
/// report which file on disk misbehaved.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path of the backend that failed.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of {path}: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Path of the backend.
        path: String,
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The backend has been closed or removed.
    #[error("storage {path} is closed")]
    Closed {
        /// Path of the backend.
        path: String,
    },

    /// Attempted to append to a backend sealed read-only.
    #[error("storage {path} is sealed read-only")]
    Sealed {
        /// Path of the backend.
        path: String,
    },
}

impl StorageError {
    /// Creates an I/O error for the given path.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Creates a closed-backend error for the given path.
    pub fn closed(path: &Path) -> Self {
        Self::Closed {
            path: path.display().to_string(),
        }
    }

    /// Creates a sealed-backend error for the given path.
    pub fn sealed(path: &Path) -> Self {
        Self::Sealed {
            path: path.display().to_string(),
        }
    }
}
