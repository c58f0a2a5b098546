//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a [`FileBackend`] is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open read-write with writes appended to the end; the file is created
    /// if it does not exist.
    Append,
    /// Open read-only; the file must already exist.
    ReadOnly,
}

/// A file-based storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` pushes buffered data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking ensures consistent access.
///
/// # Example
///
/// ```no_run
/// use firkin_storage::{StorageBackend, FileBackend, OpenMode};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("data.bin"), OpenMode::Append).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<Option<File>>,
    size: RwLock<u64>,
    mode: RwLock<OpenMode>,
}

impl FileBackend {
    /// Opens a file backend at the given path.
    ///
    /// In [`OpenMode::Append`] the file is created if missing and all writes
    /// go to the end. In [`OpenMode::ReadOnly`] the file must already exist
    /// and appends are rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, mode: OpenMode) -> StorageResult<Self> {
        let file = match mode {
            OpenMode::Append => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path),
            OpenMode::ReadOnly => OpenOptions::new().read(true).open(path),
        }
        .map_err(|e| StorageError::io(path, e))?;

        let size = file
            .metadata()
            .map_err(|e| StorageError::io(path, e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            size: RwLock::new(size),
            mode: RwLock::new(mode),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        *self.mode.read()
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd {
                path: self.path.display().to_string(),
                offset,
                len,
                size,
            });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| StorageError::closed(&self.path))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)
            .map_err(|e| StorageError::io(&self.path, e))?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if *self.mode.read() == OpenMode::ReadOnly {
            return Err(StorageError::sealed(&self.path));
        }

        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| StorageError::closed(&self.path))?;

        if data.is_empty() {
            return Ok(*self.size.read());
        }

        // The file is in append mode, so the write lands at the end
        // regardless of where read_at last left the cursor.
        file.write_all(data)
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut size = self.size.write();
        let offset = *size;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| StorageError::closed(&self.path))?;
        file.flush().map_err(|e| StorageError::io(&self.path, e))
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let guard = self.file.write();
        let file = guard.as_ref().ok_or_else(|| StorageError::closed(&self.path))?;
        file.sync_all().map_err(|e| StorageError::io(&self.path, e))
    }

    fn seal(&mut self) -> StorageResult<()> {
        let mut guard = self.file.write();
        let file = guard.take().ok_or_else(|| StorageError::closed(&self.path))?;

        file.sync_all().map_err(|e| StorageError::io(&self.path, e))?;
        drop(file);

        let reopened = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;

        *guard = Some(reopened);
        *self.mode.write() = OpenMode::ReadOnly;

        Ok(())
    }

    fn remove(&mut self) -> StorageResult<()> {
        let mut guard = self.file.write();
        let file = guard.take().ok_or_else(|| StorageError::closed(&self.path))?;
        drop(file);

        std::fs::remove_file(&self.path).map_err(|e| StorageError::io(&self.path, e))
    }
}
