//! Cache Entry Type
//!
//! A single cached item: key, value, and the timestamp of its last use.
//! Entries live inside exactly one quadtree node's LRU queue; the queue is
//! kept ordered by `last_used`, so `Entry` implements `Ord` on that field
//! alone. Ties on `last_used` are possible (the clock may return the same
//! tick twice) and are resolved by queue position, never by key or value.
//!
//! # Memory Layout
//!
//! Each entry carries:
//! - `key: K` - User's key type (also stored in the node's lookup map)
//! - `value: V` - User's value type
//! - `last_used: u64` - 8 bytes (clock tick of the last set or access)
//!
//! # Clock Discipline
//!
//! `last_used` is always assigned from the cache's clock, never from an
//! ambient time source. Every mutation reads the clock once at its start,
//! so for any node's queue the timestamps are non-decreasing from the
//! least recently used end.

use core::cmp::Ordering;
use core::fmt;

use crate::Time;

/// A cached item ordered by its `last_used` timestamp.
///
/// Supports ordering by `last_used` only. This is what lets a node's LRU
/// queue answer "which entry here was used least recently" without
/// consulting keys or values.
pub(crate) struct Entry<K, V> {
    /// The cached key. Duplicated in the owning node's data map.
    pub key: K,

    /// The cached value.
    pub value: V,

    /// Clock tick at which this entry was last set or accessed.
    pub last_used: Time,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry stamped with the given clock tick.
    #[inline]
    pub(crate) fn new(key: K, value: V, now: Time) -> Self {
        Entry {
            key,
            value,
            last_used: now,
        }
    }

    /// Re-stamps the entry after an access.
    ///
    /// The caller must also move the entry to the most-recently-used end
    /// of its queue; `touch` alone does not reorder anything.
    #[inline]
    pub(crate) fn touch(&mut self, now: Time) {
        self.last_used = now;
    }
}

impl<K, V> PartialEq for Entry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.last_used == other.last_used
    }
}

impl<K, V> Eq for Entry<K, V> {}

impl<K, V> PartialOrd for Entry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, V> Ord for Entry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.last_used.cmp(&other.last_used)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("last_used", &self.last_used)
            .finish()
    }
}
