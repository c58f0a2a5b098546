//! Error types for the Firkin storage engine.

use crate::types::FileId;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in Firkin store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] firkin_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration validation failure at startup.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the validation failure.
        message: String,
    },

    /// The data directory contains files that are not segment files.
    ///
    /// Recovery refuses to start rather than guess at foreign files.
    #[error("data directory {dir} contains unrecognized files: {files:?}")]
    UnrecognizedFiles {
        /// The data directory that was scanned.
        dir: String,
        /// The entries that did not parse as segment file names.
        files: Vec<String>,
    },

    /// Another process holds the data directory lock.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// A segment failed structural or CRC validation during replay.
    #[error("corrupt segment {fid} at offset {offset}: {message}")]
    CorruptSegment {
        /// Segment that failed to replay.
        fid: FileId,
        /// Byte offset of the record where replay failed.
        offset: u32,
        /// Description of the corruption.
        message: String,
    },

    /// A single record failed structural or CRC validation on read.
    #[error("corrupt record in segment {fid} at offset {offset}: {message}")]
    CorruptRecord {
        /// Segment the record was read from.
        fid: FileId,
        /// Byte offset of the record.
        offset: u32,
        /// Description of the corruption.
        message: String,
    },

    /// Record bytes are shorter than the minimum encoded record.
    #[error("record too short: {len} bytes")]
    RecordTooShort {
        /// Length of the input.
        len: usize,
    },

    /// Record bytes do not match the size implied by the header.
    #[error("record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch {
        /// Size implied by the header lengths.
        expected: usize,
        /// Actual input size.
        actual: usize,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A record carries a type byte the codec does not know.
    #[error("unknown record type: {byte:#04x}")]
    UnknownRecordType {
        /// The unrecognized type byte.
        byte: u8,
    },

    /// Key is not present in the store.
    #[error("key not found")]
    KeyNotFound,

    /// The record was decoded successfully but is past its expiry.
    #[error("key expired")]
    KeyExpired,

    /// Combined key and value payload exceeds the configured limit.
    #[error("key/value payload too large: {size} bytes, max {max}")]
    KeyTooLarge {
        /// Combined key and value size.
        size: usize,
        /// Configured maximum.
        max: u32,
    },

    /// Time-to-live rejected by validation.
    #[error("invalid ttl: {message}")]
    InvalidTtl {
        /// Description of the ttl issue.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// An engine invariant was violated.
    ///
    /// This is always a bug, never a recoverable condition - for example an
    /// index entry pointing at a segment that is neither active nor sealed.
    #[error("internal inconsistency: {message}")]
    InternalInconsistency {
        /// Description of the violated invariant.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a corrupt segment error.
    pub fn corrupt_segment(fid: FileId, offset: u32, message: impl Into<String>) -> Self {
        Self::CorruptSegment {
            fid,
            offset,
            message: message.into(),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt_record(fid: FileId, offset: u32, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            fid,
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid ttl error.
    pub fn invalid_ttl(message: impl Into<String>) -> Self {
        Self::InvalidTtl {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an internal inconsistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInconsistency {
            message: message.into(),
        }
    }
}
