//! In-memory key index.
//!
//! The memtable maps every live key to the [`Position`] of its most recent
//! `Set` record. It is volatile: recovery rebuilds it by replaying segments
//! in ascending file-id order.

use crate::types::Position;
use std::collections::BTreeMap;

/// Ordered in-memory map from key bytes to record positions.
///
/// Keys are ordered lexicographically, which is what [`Memtable::fold`]
/// iterates in.
#[derive(Debug, Default)]
pub struct Memtable {
    entries: BTreeMap<Vec<u8>, Position>,
}

impl Memtable {
    /// Creates an empty memtable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the position for a key.
    pub fn put(&mut self, key: Vec<u8>, pos: Position) {
        self.entries.insert(key, pos);
    }

    /// Looks up the position for a key.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Position> {
        self.entries.get(key).copied()
    }

    /// Removes the mapping for a key, returning whether it existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns the number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the memtable is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visits entries in ascending key order.
    ///
    /// The callback returns `true` to continue and `false` to stop the
    /// traversal early.
    pub fn fold<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], Position) -> bool,
    {
        for (key, pos) in &self.entries {
            if !f(key, *pos) {
                break;
            }
        }
    }

    /// Returns an ascending-order snapshot of all entries.
    ///
    /// The engine iterates snapshots rather than holding the index lock
    /// while user callbacks or segment I/O run.
    #[must_use]
    pub fn entries(&self) -> Vec<(Vec<u8>, Position)> {
        let mut entries = Vec::with_capacity(self.len());
        self.fold(|key, pos| {
            entries.push((key.to_vec(), pos));
            true
        });
        entries
    }
}
