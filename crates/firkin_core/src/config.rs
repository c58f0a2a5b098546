//! Store configuration.

use crate::error::{StoreError, StoreResult};
use std::path::PathBuf;

/// Upper bound for `max_key_value_bytes`.
const MAX_PAYLOAD_CEILING: u32 = 10 * 1024 * 1024;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for segment files; created if missing.
    pub data_dir: PathBuf,

    /// Maximum size of the active segment before rotation.
    pub segment_max_bytes: u32,

    /// Maximum combined size of a single key and value.
    pub max_key_value_bytes: u32,

    /// Fan-out hint for the ordered in-memory index.
    pub memtable_order: usize,

    /// Whether to fsync the active segment after every append
    /// (safer but slower). A clean close always syncs.
    pub sync_on_put: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            segment_max_bytes: 64 * 1024, // 64 KiB
            max_key_value_bytes: 1024,    // 1 KiB
            memtable_order: 4,
            sync_on_put: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the segment rotation threshold.
    #[must_use]
    pub const fn segment_max_bytes(mut self, bytes: u32) -> Self {
        self.segment_max_bytes = bytes;
        self
    }

    /// Sets the maximum combined key/value size.
    #[must_use]
    pub const fn max_key_value_bytes(mut self, bytes: u32) -> Self {
        self.max_key_value_bytes = bytes;
        self
    }

    /// Sets the index fan-out hint.
    #[must_use]
    pub const fn memtable_order(mut self, order: usize) -> Self {
        self.memtable_order = order;
        self
    }

    /// Sets whether to fsync after every append.
    #[must_use]
    pub const fn sync_on_put(mut self, value: bool) -> Self {
        self.sync_on_put = value;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] describing the first rule
    /// violated.
    pub fn validate(&self) -> StoreResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(StoreError::invalid_config("data_dir must not be empty"));
        }
        if self.memtable_order < 3 {
            return Err(StoreError::invalid_config("memtable_order must be at least 3"));
        }
        if self.segment_max_bytes == 0 {
            return Err(StoreError::invalid_config(
                "segment_max_bytes must be greater than 0",
            ));
        }
        if self.max_key_value_bytes == 0 || self.max_key_value_bytes > MAX_PAYLOAD_CEILING {
            return Err(StoreError::invalid_config(
                "max_key_value_bytes must be between 1 byte and 10 MiB",
            ));
        }
        Ok(())
    }
}
