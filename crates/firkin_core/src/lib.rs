//! # Firkin
//!
//! A persistent, embedded key/value store built on an append-only segment
//! log.
//!
//! All writes go to the active append-only segment file; an in-memory index
//! maps every live key to the byte position of its most recent record; reads
//! take one hop through the index and one positioned read on disk. Dead
//! records (overwritten or tombstoned) are reclaimed by [`Store::flush`],
//! which rewrites live records into a fresh segment and deletes the old
//! files.
//!
//! ## On-Disk Layout
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ wal_00000.log     # Sealed segment
//! └─ wal_00001.log     # Active segment
//! ```
//!
//! Each segment is a bare sequence of records, little-endian:
//!
//! ```text
//! | expire_at (4) | type (1) | key_len (4) | value_len (4) | key | value | crc32 (4) |
//! ```
//!
//! ## Durability
//!
//! Records are persisted on append and never mutated in place. By default
//! the OS decides when data hits the platter; set
//! [`Config::sync_on_put`] to fsync after every append. A clean
//! [`Store::close`] always syncs the active segment. Recovery verifies
//! every live record's CRC32 and refuses to open over a corrupt or
//! truncated segment.
//!
//! ## Example
//!
//! ```no_run
//! use firkin_core::{Config, Store};
//! use std::time::Duration;
//!
//! let store = Store::open(Config::new().data_dir("./data"))?;
//!
//! store.put(b"ale", b"3.8%")?;
//! store.put_with_ttl(b"cask", b"tapped", Duration::from_secs(60))?;
//! assert_eq!(store.get(b"ale")?, b"3.8%");
//!
//! store.fold(|key, value| {
//!     println!("{:?} => {:?}", key, value);
//!     true
//! })?;
//!
//! store.close()?;
//! # Ok::<(), firkin_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dir;
pub mod error;
pub mod index;
pub mod record;
pub mod segment;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use record::{Record, RecordType, EXPIRE_NEVER};
pub use store::Store;
pub use types::{FileId, Position};
