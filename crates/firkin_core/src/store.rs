//! The storage engine.
//!
//! [`Store`] orchestrates segments and the memtable: startup recovery, the
//! rotation-checked write path, reads, delete tombstones, ordered folds over
//! live data, and compaction.
//!
//! ## Locking
//!
//! A single engine-level readers-writer lock protects the segment set (the
//! sealed-segment map, the active segment, and the maximum file id); the
//! memtable has its own lock. Writers acquire the engine lock exclusively
//! for the rotation check, the append, and the index update; readers share
//! it across lookup, segment resolution, and the record read. Fold and
//! compaction iterate snapshots of `(key, position)` pairs and take the
//! engine lock per position, so user callbacks never run under any engine
//! lock and may re-enter the store.

use crate::config::Config;
use crate::dir::DataDir;
use crate::error::{StoreError, StoreResult};
use crate::index::Memtable;
use crate::record::{unix_now, Record};
use crate::segment::Segment;
use crate::types::{FileId, Position};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// The segment set guarded by the engine lock.
#[derive(Debug)]
struct Segments {
    /// Sealed segments, keyed by file id.
    older: HashMap<FileId, Segment>,
    /// The unique appendable segment; always carries `max_fid`.
    active: Segment,
    /// Highest file id ever assigned.
    max_fid: FileId,
}

/// A persistent, embedded key/value store over an append-only segment log.
///
/// All writes append to the active segment; an in-memory index maps every
/// live key to the position of its most recent record; reads take one hop
/// through the index and one positioned read on disk.
///
/// # Example
///
/// ```no_run
/// use firkin_core::{Config, Store};
///
/// let store = Store::open(Config::new().data_dir("./data")).unwrap();
/// store.put(b"name", b"firkin").unwrap();
/// assert_eq!(store.get(b"name").unwrap(), b"firkin");
/// ```
#[derive(Debug)]
pub struct Store {
    config: Config,
    dir: DataDir,
    memtable: RwLock<Memtable>,
    wals: RwLock<Segments>,
    /// Serializes compaction passes.
    flush_lock: Mutex<()>,
}

impl Store {
    /// Opens a store, recovering state from any existing segment files.
    ///
    /// Segments are replayed into the index in ascending file-id order; the
    /// highest-numbered segment becomes the active one. An empty directory
    /// starts with segment 0.
    ///
    /// # Errors
    ///
    /// Construction fails - never partially - on an invalid config, a held
    /// directory lock, unrecognized files in the data directory, or a
    /// corrupt segment.
    pub fn open(config: Config) -> StoreResult<Self> {
        config.validate()?;
        let dir = DataDir::open(&config.data_dir)?;
        let fids = dir.scan_segment_ids()?;

        let mut memtable = Memtable::new();
        let now = unix_now();

        let segments = if fids.is_empty() {
            let active = Segment::create(&dir, FileId::new(0))?;
            dir.sync()?;
            Segments {
                older: HashMap::new(),
                active,
                max_fid: FileId::new(0),
            }
        } else {
            let mut older = HashMap::new();
            let (last, sealed) = fids.split_last().expect("fids is non-empty");

            for &fid in sealed {
                let mut segment = Segment::open_read_only(&dir, fid)?;
                segment.replay(&mut memtable, now)?;
                older.insert(fid, segment);
            }

            let mut active = Segment::create(&dir, *last)?;
            active.replay(&mut memtable, now)?;

            Segments {
                older,
                active,
                max_fid: *last,
            }
        };

        debug!(
            segments = segments.older.len() + 1,
            keys = memtable.len(),
            active = %segments.max_fid,
            "recovered store"
        );

        Ok(Self {
            config,
            dir,
            memtable: RwLock::new(memtable),
            wals: RwLock::new(segments),
            flush_lock: Mutex::new(()),
        })
    }

    /// Stores a key/value pair that never expires.
    ///
    /// # Errors
    ///
    /// Rejects empty keys and payloads over `max_key_value_bytes`; I/O
    /// failures propagate. A failed append never updates the index.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_payload(key, value)?;
        let record = Record::set_forever(key.to_vec(), value.to_vec());
        self.put_record(&record)
    }

    /// Stores a key/value pair that expires `ttl` from now.
    ///
    /// # Errors
    ///
    /// As [`Store::put`], plus [`StoreError::InvalidTtl`] for zero or
    /// overflowing durations.
    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.check_payload(key, value)?;
        let record = Record::set_with_ttl(key.to_vec(), value.to_vec(), ttl, unix_now())?;
        self.put_record(&record)
    }

    /// Removes a key by appending a tombstone.
    ///
    /// Deleting an absent key is not an error; the tombstone is written
    /// regardless.
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.check_payload(key, &[])?;
        let record = Record::tombstone(key.to_vec());
        let data = record.encode();

        let mut wals = self.wals.write();
        self.append_locked(&mut wals, &data)?;
        self.memtable.write().delete(key);
        Ok(())
    }

    /// Fetches the current value for a key.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyNotFound`] for an absent key;
    /// [`StoreError::KeyExpired`] when the record is past its expiry (the
    /// index entry is lazily left stale - callers may re-delete).
    pub fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let wals = self.wals.read();
        let pos = self
            .memtable
            .read()
            .get(key)
            .ok_or(StoreError::KeyNotFound)?;
        let record = Self::read_position(&wals, pos, unix_now())?;
        Ok(record.value)
    }

    /// Visits every live key/value pair in ascending key order.
    ///
    /// The callback returns `true` to continue, `false` to stop. It runs
    /// with no engine lock held, so it may call back into the store. Keys
    /// observed are a snapshot taken at fold start; entries that expire
    /// mid-fold are skipped.
    ///
    /// # Errors
    ///
    /// The first segment read failure aborts the traversal and propagates.
    pub fn fold<F>(&self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let entries = {
            let _wals = self.wals.read();
            self.memtable.read().entries()
        };

        for (key, _) in entries {
            let record = {
                let wals = self.wals.read();
                // The entry may be stale; resolve through the current index
                // state so a compacted-away position is never chased.
                let Some(pos) = self.memtable.read().get(&key) else {
                    continue;
                };
                match Self::read_position(&wals, pos, unix_now()) {
                    Ok(record) => record,
                    Err(StoreError::KeyExpired) => continue,
                    Err(e) => return Err(e),
                }
            };

            if !f(&key, &record.value) {
                break;
            }
        }

        Ok(())
    }

    /// Compacts the store: rewrites all live records into the active
    /// segment chain and deletes the superseded segment files.
    ///
    /// On any read or write error the pass aborts; the old segments remain
    /// intact and the store stays usable, so `flush` is safely re-runnable.
    pub fn flush(&self) -> StoreResult<()> {
        let _flushing = self.flush_lock.lock();
        let now = unix_now();

        // Rotate so every record to compact sits in a sealed segment, then
        // snapshot the sealed set. Writes arriving after this point land in
        // strictly newer segments and are left alone.
        let snapshot: HashSet<FileId> = {
            let mut wals = self.wals.write();
            self.rotate_locked(&mut wals)?;
            wals.older.keys().copied().collect()
        };

        let entries = self.memtable.read().entries();
        let mut rewritten = 0usize;
        let mut expired = 0usize;

        for (key, snapshot_pos) in entries {
            let mut wals = self.wals.write();

            // Skip entries superseded by a concurrent write since the
            // snapshot; their records already live in a newer segment.
            let Some(current) = self.memtable.read().get(&key) else {
                continue;
            };
            if current != snapshot_pos || !snapshot.contains(&current.fid) {
                continue;
            }

            let record = {
                let segment = Self::resolve(&wals, current.fid)?;
                segment.read_raw(current.offset, current.length)?
            };

            // A record that lapsed since it was indexed is dead weight;
            // drop the index entry instead of carrying it forward.
            if record.is_expired(now) {
                self.memtable.write().delete(&key);
                expired += 1;
                continue;
            }

            // Re-append the decoded record verbatim so its expiry stamp
            // survives the rewrite.
            let data = record.encode();
            let pos = self.append_locked(&mut wals, &data)?;
            self.memtable.write().put(key, pos);
            rewritten += 1;
        }

        // Only after a complete pass is it safe to drop the old segments.
        // Delete oldest-first so a failure mid-loop can never leave a Set
        // on disk without the tombstone that shadows it.
        let mut doomed: Vec<FileId> = snapshot.into_iter().collect();
        doomed.sort();

        let mut wals = self.wals.write();
        for fid in &doomed {
            if let Some(segment) = wals.older.remove(fid) {
                segment.delete()?;
            }
        }
        drop(wals);
        self.dir.sync()?;

        debug!(rewritten, expired, reclaimed = doomed.len(), "compaction complete");
        Ok(())
    }

    /// Forces the active segment to durable storage.
    pub fn sync(&self) -> StoreResult<()> {
        self.wals.write().active.sync()
    }

    /// Syncs and shuts the store down.
    pub fn close(self) -> StoreResult<()> {
        self.wals.write().active.close()
    }

    /// Returns the number of indexed keys.
    ///
    /// Entries whose records have expired but were not re-deleted still
    /// count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memtable.read().len()
    }

    /// Returns whether no keys are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memtable.read().is_empty()
    }

    /// Returns the number of segment files, the active one included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        let wals = self.wals.read();
        wals.older.len() + 1
    }

    /// Returns the file id of the active segment.
    #[must_use]
    pub fn active_fid(&self) -> FileId {
        self.wals.read().active.fid()
    }

    fn check_payload(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_argument("key must not be empty"));
        }
        let size = key.len() + value.len();
        if size > self.config.max_key_value_bytes as usize {
            return Err(StoreError::KeyTooLarge {
                size,
                max: self.config.max_key_value_bytes,
            });
        }
        Ok(())
    }

    fn put_record(&self, record: &Record) -> StoreResult<()> {
        let data = record.encode();

        let mut wals = self.wals.write();
        let pos = self.append_locked(&mut wals, &data)?;
        self.memtable.write().put(record.key.clone(), pos);
        Ok(())
    }

    /// Appends encoded bytes to the active segment, rotating first if the
    /// write would overflow it. Runs under the engine write lock, so the
    /// size check and the append are a single atomic step.
    fn append_locked(&self, wals: &mut Segments, data: &[u8]) -> StoreResult<Position> {
        if wals.active.size()? + data.len() as u64 > u64::from(self.config.segment_max_bytes) {
            self.rotate_locked(wals)?;
        }

        let pos = wals.active.append(data)?;
        if self.config.sync_on_put {
            wals.active.sync()?;
        }
        Ok(pos)
    }

    /// Seals the active segment into the older map and installs a fresh one
    /// under the next file id.
    fn rotate_locked(&self, wals: &mut Segments) -> StoreResult<()> {
        let next = wals.max_fid.next();
        let fresh = Segment::create(&self.dir, next)?;
        self.dir.sync()?;

        let sealed = std::mem::replace(&mut wals.active, fresh);
        let sealed_fid = sealed.fid();
        wals.older.insert(sealed_fid, sealed);
        wals.max_fid = next;

        if let Some(segment) = wals.older.get_mut(&sealed_fid) {
            segment.seal()?;
        }

        debug!(sealed = %sealed_fid, active = %next, "rotated active segment");
        Ok(())
    }

    fn read_position(wals: &Segments, pos: Position, now: u32) -> StoreResult<Record> {
        let segment = Self::resolve(wals, pos.fid)?;
        segment.read(pos.offset, pos.length, now)
    }

    fn resolve(wals: &Segments, fid: FileId) -> StoreResult<&Segment> {
        if wals.active.fid() == fid {
            return Ok(&wals.active);
        }
        wals.older
            .get(&fid)
            .ok_or_else(|| StoreError::internal(format!("index references unknown segment {fid}")))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Clean shutdown guarantee: best-effort sync of the active segment.
        let _ = self.wals.write().active.sync();
    }
}
