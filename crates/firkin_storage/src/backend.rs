//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for Firkin.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading, appending, and syncing data. Firkin owns all file format
/// interpretation - backends do not understand records or segments.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data is durable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Lifecycle
///
/// A backend starts out appendable (or read-only, depending on how it was
/// opened), may be sealed read-only exactly once, and may finally be removed.
/// After `remove`, every operation fails with [`crate::StorageError::Closed`].
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read would extend beyond the current size
    /// - The backend has been removed
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is sealed or removed, or if an I/O
    /// error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after this returns
    /// successfully, all previously appended data survives process
    /// termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Seals the backend read-only.
    ///
    /// For file-based backends this reopens the same path in read-only mode.
    /// Subsequent appends fail with [`crate::StorageError::Sealed`]; reads
    /// remain valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is removed or the reopen fails.
    fn seal(&mut self) -> StorageResult<()>;

    /// Closes the backend and removes its underlying storage.
    ///
    /// Removing an already-removed backend returns
    /// [`crate::StorageError::Closed`] and performs no filesystem action.
    fn remove(&mut self) -> StorageResult<()>;
}
