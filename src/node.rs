//! Quadtree Node
//!
//! A node is the bucket for every cache entry sharing one
//! (expiry, priority) point, and at the same time an interior node of the
//! point quadtree: it partitions its descendants into four quadrants
//! around its own point.
//!
//! # Data Structure
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     Node (expiry, priority)                    │
//! │                                                                │
//! │  HashMap<K, *ListEntry>         LRU queue (doubly linked)      │
//! │  ┌──────────────┐          ┌─────────────────────────────┐     │
//! │  │ "apple" ──────────────▶ │ MRU ◀──▶ ... ◀──▶ LRU      │     │
//! │  │ "banana" ─────────────▶ │                             │     │
//! │  └──────────────┘          └─────────────────────────────┘     │
//! │                                                                │
//! │  quadrants: [Q1, Q2, Q3, Q4]  (child node ids)                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **HashMap**: O(1) key lookup, storing pointers to queue nodes
//! - **LRU queue**: entry order by `last_used` (most recent at the front)
//! - **quadrants**: child ids, resolved through the tree's arena
//!
//! # Quadrant Comparators
//!
//! Routing a point around a node uses asymmetric comparators: expiry is
//! compared with `<=` (the node's own expiry counts as "older or equal")
//! while priority is compared with `<` (strict), so an equal priority
//! routes to the lower-or-equal side. Exact (expiry, priority) duplicates
//! never reach routing; the cache reuses the existing node via its point
//! index.
//!
//! # Thread Safety
//!
//! Nodes hold raw pointers into their own queue. All mutation requires
//! `&mut self`; `Send`/`Sync` are implemented manually below.

extern crate alloc;

use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

use crate::entry::Entry;
use crate::list::{List, ListEntry};
use crate::{Priority, Time};

/// Index of a node in the tree's arena.
///
/// Ids are only handed out for live nodes; the cache's auxiliary indices
/// are reconciled on every node removal, so a stored id never dangles.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct NodeId(pub(crate) usize);

/// The parent capability of a node.
///
/// The quadtree itself acts as the parent of the root node, so the
/// cleaning rule can ask "remove me" or "replace me with this child"
/// without caring whether the node is the root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ParentSlot {
    /// The node is the root; its parent is the tree's root slot.
    Root,
    /// The node hangs off a quadrant of another node.
    Interior(NodeId),
}

/// The four quadrants of a node, indexed by two comparator bits.
///
/// - `OlderHigher`: older or equal expiry, higher priority
/// - `OlderLower`: older or equal expiry, lower or equal priority
/// - `NewerHigher`: newer expiry, higher priority
/// - `NewerLower`: newer expiry, lower or equal priority
///
/// "Higher priority" means a numerically smaller priority value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Quadrant {
    OlderHigher = 0,
    OlderLower = 1,
    NewerHigher = 2,
    NewerLower = 3,
}

impl Quadrant {
    /// Quadrants whose whole subtree has expiry older than or equal to
    /// the node's own.
    pub(crate) const OLDER: [Quadrant; 2] = [Quadrant::OlderHigher, Quadrant::OlderLower];

    /// Quadrants whose whole subtree has expiry newer than the node's own.
    pub(crate) const NEWER: [Quadrant; 2] = [Quadrant::NewerHigher, Quadrant::NewerLower];

    /// Quadrants whose whole subtree has priority lower than or equal to
    /// the node's own. These are the only directions along which a
    /// lower-priority victim can be found.
    pub(crate) const LOWER: [Quadrant; 2] = [Quadrant::OlderLower, Quadrant::NewerLower];

    /// Resolves the quadrant for a point relative to a node, from the two
    /// comparator results.
    #[inline]
    pub(crate) fn from_components(older_or_equal_expiry: bool, higher_priority: bool) -> Quadrant {
        match (older_or_equal_expiry, higher_priority) {
            (true, true) => Quadrant::OlderHigher,
            (true, false) => Quadrant::OlderLower,
            (false, true) => Quadrant::NewerHigher,
            (false, false) => Quadrant::NewerLower,
        }
    }

    /// Position of this quadrant in a node's child array.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A quadtree node: the bucket of all entries at one (expiry, priority)
/// point, plus up to four child subtrees.
///
/// Entry-level operations live here; structural operations (insertion,
/// promotion, pruning) live on the tree, which owns the arena that child
/// ids resolve through.
pub(crate) struct Node<K, V, S = DefaultHashBuilder> {
    /// Absolute tick at which every entry in this node becomes invalid.
    pub(crate) expiry: Time,
    /// Priority shared by every entry in this node. Lower value = more
    /// important.
    pub(crate) priority: Priority,
    /// The slot this node occupies in its parent (or the tree root slot).
    pub(crate) parent: ParentSlot,
    /// Child subtrees by quadrant. `None` means the quadrant is empty.
    pub(crate) quadrants: [Option<NodeId>; 4],

    data: HashMap<K, *mut ListEntry<Entry<K, V>>, S>,
    lru: List<Entry<K, V>>,
    /// Keys cleared while the node was retained as an expired pivot.
    /// Still referenced by the cache's key index; reported on reclaim so
    /// the index can drop them when the node finally leaves the tree.
    stranded: Vec<K>,
}

// SAFETY: Node owns all data and the raw pointers point only to queue
// nodes owned by `lru`. Concurrent access is safe when wrapped in proper
// synchronization primitives.
unsafe impl<K: Send, V: Send, S: Send> Send for Node<K, V, S> {}

// SAFETY: All mutation requires &mut self; shared references cannot cause
// data races.
unsafe impl<K: Sync, V: Sync, S: Sync> Sync for Node<K, V, S> {}

impl<K: Hash + Eq, V, S: BuildHasher> Node<K, V, S> {
    /// Creates an empty node at the given point.
    pub(crate) fn new(expiry: Time, priority: Priority, parent: ParentSlot, hasher: S) -> Self {
        Node {
            expiry,
            priority,
            parent,
            quadrants: [None; 4],
            data: HashMap::with_hasher(hasher),
            lru: List::new(),
            stranded: Vec::new(),
        }
    }

    /// Returns true if this node holds no entries.
    ///
    /// An empty node may still be structurally necessary: the cleaning
    /// rule keeps it as a pivot while it separates two or more subtrees.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of entries in this node.
    #[allow(dead_code)] // Used by tests; kept alongside is_empty
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if this node's point has expired at the given tick.
    #[inline]
    pub(crate) fn expired(&self, now: Time) -> bool {
        self.expiry < now
    }

    /// `last_used` of the least recently used entry, or `None` when the
    /// node has no entries.
    #[inline]
    pub(crate) fn lru_time(&self) -> Option<Time> {
        self.lru.back().map(|entry| entry.last_used)
    }

    /// Returns true if the given key has an entry in this node.
    pub(crate) fn contains_entry<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.data.contains_key(key)
    }

    /// Adds a new entry at the most-recently-used position.
    ///
    /// `now` must be at least the `last_used` of every entry already in
    /// the node; the cache guarantees this by reading its monotonic clock
    /// once at the start of each mutation. Constant time.
    pub(crate) fn add_entry(&mut self, key: K, value: V, now: Time)
    where
        K: Clone,
    {
        let entry = Entry::new(key.clone(), value, now);
        let node = self.lru.add(entry);
        self.data.insert(key, node);
    }

    /// Removes the entry for `key` and returns its value.
    ///
    /// Returns `None` when the key has no entry here (the *missing-entry*
    /// case). The matching queue node is located through the stored
    /// pointer, so removal is O(1) and matches by identity even among
    /// entries with equal `last_used`.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.data.remove(key)?;
        // SAFETY: node comes from our map and is part of our queue
        let boxed = unsafe { self.lru.remove(node) }?;
        // SAFETY: remove only ever returns non-sigil entries
        let entry = unsafe { boxed.into_value() };
        Some(entry.value)
    }

    /// Removes the least recently used entry and returns it.
    ///
    /// Returns `None` when the node has no entries (the *empty-node*
    /// case).
    pub(crate) fn pop_lru_entry(&mut self) -> Option<(K, V)> {
        let boxed = self.lru.remove_last()?;
        // SAFETY: remove_last only ever returns non-sigil entries
        let entry = unsafe { boxed.into_value() };
        self.data.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    /// Reads the value for `key`, re-stamping the entry with `now` and
    /// moving it to the most-recently-used position.
    ///
    /// Returns `None` when the key has no entry here.
    pub(crate) fn access_entry<Q>(&mut self, key: &Q, now: Time) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.data.get(key).copied()?;
        unsafe {
            // SAFETY: node comes from our map
            self.lru.move_to_front(node);
            let entry = (*node).get_value_mut();
            entry.touch(now);
            Some(&entry.value)
        }
    }

    /// Removes every entry, returning how many were removed.
    ///
    /// Invoked when the node has expired but must remain in the tree as a
    /// structural pivot. The cleared keys are remembered: the cache's key
    /// index still references them, and they must be reported whenever
    /// this node is eventually reclaimed.
    pub(crate) fn clear_entries(&mut self) -> usize {
        let removed = self.lru.len();
        self.stranded.extend(self.data.drain().map(|(key, _)| key));
        self.lru.clear();
        removed
    }

    /// Consumes the node, returning its entry count and every key the
    /// cache's key index may still map to it: current entries plus keys
    /// stranded by earlier clears. Used when the tree frees a node so the
    /// cache can erase the matching auxiliary index entries.
    pub(crate) fn reclaim(self) -> (usize, Vec<K>) {
        let Node {
            data,
            lru,
            mut stranded,
            ..
        } = self;
        let count = lru.len();
        stranded.extend(data.into_keys());
        (count, stranded)
    }
}

impl<K, V, S> fmt::Debug for Node<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("expiry", &self.expiry)
            .field("priority", &self.priority)
            .field("entries", &self.data.len())
            .finish()
    }
}
