//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::path::Path;

/// Pseudo-path reported in errors from the in-memory backend.
const MEMORY_PATH: &str = "<memory>";

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Ephemeral stores that don't need persistence
///
/// It honors the full backend lifecycle: sealing rejects further appends and
/// removal closes the backend, so segment logic can be exercised without
/// touching the filesystem.
///
/// # Example
///
/// ```rust
/// use firkin_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    sealed: RwLock<bool>,
    removed: RwLock<bool>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            sealed: RwLock::new(false),
            removed: RwLock::new(false),
        }
    }

    /// Returns a copy of all data in the backend.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    fn check_open(&self) -> StorageResult<()> {
        if *self.removed.read() {
            return Err(StorageError::closed(Path::new(MEMORY_PATH)));
        }
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.check_open()?;

        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd {
                path: MEMORY_PATH.to_string(),
                offset,
                len,
                size,
            });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        self.check_open()?;
        if *self.sealed.read() {
            return Err(StorageError::sealed(Path::new(MEMORY_PATH)));
        }

        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check_open()
    }

    fn size(&self) -> StorageResult<u64> {
        self.check_open()?;
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_open()
    }

    fn seal(&mut self) -> StorageResult<()> {
        self.check_open()?;
        *self.sealed.write() = true;
        Ok(())
    }

    fn remove(&mut self) -> StorageResult<()> {
        self.check_open()?;
        *self.removed.write() = true;
        self.data.write().clear();
        Ok(())
    }
}
