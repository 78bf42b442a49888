//! Cross-partition deduplication.

use crate::core::EntityRecord;

use std::collections::HashSet;

/// Tracks which numeric ids have been accepted in a session.
///
/// Letter partitions overlap heavily (an instructor named "Ada Lovelace"
/// matches both `A` and `L`), so every parsed record passes through here
/// exactly once. The first parse of an identity wins.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    seen: HashSet<u64>,
    duplicates: u64,
}

impl Deduplicator {
    /// Creates an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a record's identity as seen.
    ///
    /// Returns `true` if the identity is new. Returns `false` for an identity
    /// that was already accepted; the caller must then drop the record.
    pub fn accept(&mut self, record: &EntityRecord) -> bool {
        if self.seen.insert(record.numeric_id) {
            true
        } else {
            self.duplicates += 1;
            false
        }
    }

    /// Returns `true` if the identity has been accepted.
    pub fn contains(&self, numeric_id: u64) -> bool {
        self.seen.contains(&numeric_id)
    }

    /// Number of unique identities accepted.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing has been accepted.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of rejected repeats.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
