//! Append-only log segments.
//!
//! A segment owns one file on disk and tracks its id and current write
//! offset. The active segment accepts appends; sealed segments are
//! read-only. On startup each segment replays itself into the memtable
//! in ascending file-id order, so a later segment always wins for a key.

use crate::dir::DataDir;
use crate::error::{StoreError, StoreResult};
use crate::index::Memtable;
use crate::record::{compute_crc32, Record, RecordType, CRC_SIZE, HEADER_SIZE};
use crate::types::{FileId, Position};
use firkin_storage::{FileBackend, OpenMode, StorageBackend, StorageError};

/// Clamps a file offset into the 32-bit position space.
fn offset_u32(offset: u64) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}

/// One append-only log file.
///
/// `offset` mirrors the on-disk size: it starts at the file's current size
/// (0 for a fresh file) and advances on every successful append.
#[derive(Debug)]
pub struct Segment {
    fid: FileId,
    backend: Box<dyn StorageBackend>,
    offset: u32,
}

impl Segment {
    /// Creates or reopens the segment file for `fid` in append mode.
    pub fn create(dir: &DataDir, fid: FileId) -> StoreResult<Self> {
        let backend = FileBackend::open(&dir.segment_path(fid), OpenMode::Append)?;
        let offset = u32::try_from(backend.size()?)
            .map_err(|_| StoreError::corrupt_segment(fid, u32::MAX, "segment exceeds 4 GiB"))?;

        Ok(Self {
            fid,
            backend: Box::new(backend),
            offset,
        })
    }

    /// Opens the segment file for `fid` read-only.
    ///
    /// The offset starts at 0 and is advanced by [`Segment::replay`].
    pub fn open_read_only(dir: &DataDir, fid: FileId) -> StoreResult<Self> {
        let backend = FileBackend::open(&dir.segment_path(fid), OpenMode::ReadOnly)?;

        Ok(Self {
            fid,
            backend: Box::new(backend),
            offset: 0,
        })
    }

    /// Builds a segment over an arbitrary backend, for tests.
    #[cfg(test)]
    pub(crate) fn with_backend(fid: FileId, backend: Box<dyn StorageBackend>) -> Self {
        Self {
            fid,
            backend,
            offset: 0,
        }
    }

    /// Returns the segment's file id.
    #[must_use]
    pub fn fid(&self) -> FileId {
        self.fid
    }

    /// Returns the current write offset.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Appends encoded record bytes, returning where they were written.
    ///
    /// The write offset advances only after the backend reports success, so
    /// a failed append leaves the segment's cursor untouched.
    pub fn append(&mut self, data: &[u8]) -> StoreResult<Position> {
        let length = u32::try_from(data.len())
            .map_err(|_| StoreError::invalid_argument("record larger than 4 GiB"))?;

        self.backend.append(data)?;

        let pos = Position::new(self.fid, self.offset, length);
        self.offset += length;
        Ok(pos)
    }

    /// Reads and decodes the record at `offset`, enforcing expiry.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyExpired`] for an expired record; any structural or
    /// checksum failure surfaces as [`StoreError::CorruptRecord`].
    pub fn read(&self, offset: u32, length: u32, now: u32) -> StoreResult<Record> {
        let data = self.backend.read_at(u64::from(offset), length as usize)?;
        Record::decode_live(&data, now).map_err(|e| self.wrap_read_error(offset, e))
    }

    /// Reads and decodes the record at `offset` without the expiry check.
    ///
    /// Compaction uses this so a live record's `expire_at` is carried
    /// through to its rewritten copy verbatim.
    pub fn read_raw(&self, offset: u32, length: u32) -> StoreResult<Record> {
        let data = self.backend.read_at(u64::from(offset), length as usize)?;
        Record::decode(&data).map_err(|e| self.wrap_read_error(offset, e))
    }

    fn wrap_read_error(&self, offset: u32, err: StoreError) -> StoreError {
        match err {
            StoreError::KeyExpired => StoreError::KeyExpired,
            other => StoreError::corrupt_record(self.fid, offset, other.to_string()),
        }
    }

    /// Sequentially scans the whole file, applying every record to the
    /// memtable.
    ///
    /// Expired records are skipped wholesale: no CRC check, no index effect.
    /// They can never shadow a newer live record because the engine replays
    /// segments in ascending file-id order. Within one segment, a later
    /// offset naturally wins by overwriting the memtable entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::CorruptSegment`] citing the record's start offset on a
    /// checksum mismatch, an unknown record type, or a truncated tail.
    pub fn replay(&mut self, memtable: &mut Memtable, now: u32) -> StoreResult<()> {
        let file_size = self.backend.size()?;
        let mut offset = 0u64;

        while offset < file_size {
            let start = offset;

            let header = self.read_span(offset, HEADER_SIZE, start)?;
            let expire_at = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let type_byte = header[4];
            let key_len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;
            let value_len =
                u32::from_le_bytes([header[9], header[10], header[11], header[12]]) as usize;
            offset += HEADER_SIZE as u64;

            let key = self.read_span(offset, key_len, start)?;
            offset += key_len as u64;

            let value = self.read_span(offset, value_len, start)?;
            offset += value_len as u64;

            let crc_buf = self.read_span(offset, CRC_SIZE, start)?;
            let stored_crc = u32::from_le_bytes([crc_buf[0], crc_buf[1], crc_buf[2], crc_buf[3]]);
            offset += CRC_SIZE as u64;

            if expire_at <= now {
                continue;
            }

            let mut payload = Vec::with_capacity(HEADER_SIZE + key_len + value_len);
            payload.extend_from_slice(&header);
            payload.extend_from_slice(&key);
            payload.extend_from_slice(&value);

            let computed_crc = compute_crc32(&payload);
            if computed_crc != stored_crc {
                return Err(StoreError::corrupt_segment(
                    self.fid,
                    offset_u32(start),
                    format!("checksum mismatch: expected {stored_crc:08x}, got {computed_crc:08x}"),
                ));
            }

            let length = offset_u32(offset - start);
            match RecordType::from_byte(type_byte) {
                Some(RecordType::Set) => {
                    memtable.put(key, Position::new(self.fid, offset_u32(start), length));
                }
                Some(RecordType::Delete) => {
                    memtable.delete(&key);
                }
                None => {
                    return Err(StoreError::corrupt_segment(
                        self.fid,
                        offset_u32(start),
                        format!("unknown record type: {type_byte:#04x}"),
                    ));
                }
            }
        }

        self.offset = offset_u32(file_size);
        Ok(())
    }

    fn read_span(&self, offset: u64, len: usize, record_start: u64) -> StoreResult<Vec<u8>> {
        self.backend.read_at(offset, len).map_err(|e| match e {
            StorageError::ReadPastEnd { .. } => StoreError::corrupt_segment(
                self.fid,
                offset_u32(record_start),
                "truncated record at end of segment",
            ),
            other => StoreError::Storage(other),
        })
    }

    /// Reopens the underlying file read-only; further appends are invalid.
    pub fn seal(&mut self) -> StoreResult<()> {
        self.backend.seal()?;
        Ok(())
    }

    /// Returns the on-disk size.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Forces all appended data to durable storage.
    pub fn sync(&mut self) -> StoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Syncs pending writes before shutdown.
    ///
    /// The file handle itself closes when the segment is dropped.
    pub fn close(&mut self) -> StoreResult<()> {
        self.sync()
    }

    /// Closes the segment and deletes its file.
    pub fn delete(mut self) -> StoreResult<()> {
        self.backend.remove()?;
        Ok(())
    }
}
