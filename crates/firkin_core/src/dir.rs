//! Data directory management.
//!
//! This module handles the file system layout for a Firkin store:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ wal_00000.log     # Sealed segment
//! ├─ wal_00001.log     # Sealed segment
//! └─ wal_00002.log     # Active segment (highest id)
//! ```
//!
//! Segment files are named `wal_NNNNN.log` with the file id zero-padded to
//! five decimal digits. Ids above 99999 break the padding but still parse;
//! the scan sorts numerically, never lexically. Any other entry in the
//! directory is a hard error - recovery refuses to start rather than guess
//! at foreign files.

use crate::error::{StoreError, StoreResult};
use crate::types::FileId;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SEGMENT_PREFIX: &str = "wal_";
const SEGMENT_SUFFIX: &str = ".log";

/// Returns the file name of the segment with the given id.
pub(crate) fn segment_file_name(fid: FileId) -> String {
    format!("{SEGMENT_PREFIX}{:05}{SEGMENT_SUFFIX}", fid.as_u32())
}

/// Parses a directory entry name as a segment file id.
fn parse_segment_file_name(name: &str) -> Option<FileId> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(FileId::new)
}

/// Manages the store's directory structure and file locking.
///
/// # Thread Safety
///
/// The `DataDir` holds an exclusive lock on the data directory.
/// Only one `DataDir` instance can exist per directory at a time.
#[derive(Debug)]
pub struct DataDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl DataDir {
    /// Opens the data directory, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `DatabaseLocked`)
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        // Acquire exclusive lock (non-blocking)
        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the segment file with the given id.
    #[must_use]
    pub fn segment_path(&self, fid: FileId) -> PathBuf {
        self.path.join(segment_file_name(fid))
    }

    /// Scans the directory for segment files and returns their ids,
    /// sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnrecognizedFiles`] naming every entry that is
    /// not a segment file (the lock file excepted).
    pub fn scan_segment_ids(&self) -> StoreResult<Vec<FileId>> {
        let mut fids = Vec::new();
        let mut invalid = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name == LOCK_FILE {
                continue;
            }

            match parse_segment_file_name(&name) {
                Some(fid) => fids.push(fid),
                None => invalid.push(name.into_owned()),
            }
        }

        if !invalid.is_empty() {
            invalid.sort();
            return Err(StoreError::UnrecognizedFiles {
                dir: self.path.display().to_string(),
                files: invalid,
            });
        }

        fids.sort();
        Ok(fids)
    }

    /// Syncs the data directory so entry creations and deletions are durable.
    ///
    /// On Unix, fsync on a directory syncs its entries. Windows NTFS journals
    /// metadata, so the explicit fsync is skipped there.
    #[cfg(unix)]
    pub fn sync(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    /// Syncs the data directory so entry creations and deletions are durable.
    #[cfg(not(unix))]
    pub fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}
