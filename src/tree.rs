//! Point Quadtree over the (expiry, priority) plane
//!
//! The tree owns every node through an arena and exposes the two eviction
//! sweeps:
//!
//! | Operation | Action | Time |
//! |-----------|--------|------|
//! | `insert` | Descend quadrants, create a node at the first empty slot | O(depth) |
//! | `prune_expired` | Remove every entry in expired nodes, drop removable nodes | O(expired + depth) |
//! | `prune_lowest_priority` | Best-first search for the lowest-priority LRU entry | O(log E + log P) expected |
//!
//! # Arena and parent capability
//!
//! Parent and child references are arena indices (`NodeId`), which keeps
//! the parent back-edges cycle-free and cheap to copy. The root's parent
//! is the tree itself (`ParentSlot::Root`), so the cleaning rule can run
//! identically on the root and on interior nodes.
//!
//! # Reclaim log
//!
//! The cache keeps two auxiliary maps pointing at nodes. Whenever the
//! tree frees a node it appends the node's point and any keys it still
//! held to a reclaim log; the cache drains the log after each mutating
//! call and erases the matching map entries. This keeps the maps exact at
//! a cost proportional to what was actually freed.
//!
//! # Empty pivots
//!
//! An expired node whose removal would require merging two or more
//! subtrees is kept in place with its entries cleared. It is reconsidered
//! whenever a neighbour shrinks; no rebalancing beyond the single-child
//! promotion is ever attempted, so the tree's shape depends on insertion
//! order.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ops::{Index, IndexMut};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

use crate::node::{Node, NodeId, ParentSlot, Quadrant};
use crate::{Priority, Time};

/// A node freed by the tree, reported so the cache can erase the matching
/// auxiliary index entries.
pub(crate) struct ReclaimedNode<K> {
    /// Id the freed node had. Index entries are only erased when they
    /// still map to this id, so a key re-inserted elsewhere in the same
    /// operation is never clobbered.
    pub(crate) id: NodeId,
    /// Expiry coordinate of the freed node's point.
    pub(crate) expiry: Time,
    /// Priority coordinate of the freed node's point.
    pub(crate) priority: Priority,
    /// Keys the cache's key index may still map to the freed node:
    /// entries detached with an expired subtree, plus keys stranded by an
    /// earlier pivot clear.
    pub(crate) keys: Vec<K>,
}

/// Slab-style node storage: a vector of slots plus a free list.
struct NodeArena<K, V, S> {
    slots: Vec<Option<Node<K, V, S>>>,
    free: Vec<usize>,
}

impl<K, V, S> NodeArena<K, V, S> {
    fn new() -> Self {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node<K, V, S>) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn take(&mut self, id: NodeId) -> Node<K, V, S> {
        match self.slots[id.0].take() {
            Some(node) => {
                self.free.push(id.0);
                node
            }
            None => panic!("node {} taken twice", id.0),
        }
    }
}

impl<K, V, S> Index<NodeId> for NodeArena<K, V, S> {
    type Output = Node<K, V, S>;

    fn index(&self, id: NodeId) -> &Node<K, V, S> {
        match &self.slots[id.0] {
            Some(node) => node,
            None => panic!("node {} is vacant", id.0),
        }
    }
}

impl<K, V, S> IndexMut<NodeId> for NodeArena<K, V, S> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<K, V, S> {
        match &mut self.slots[id.0] {
            Some(node) => node,
            None => panic!("node {} is vacant", id.0),
        }
    }
}

/// The point quadtree. Owns at most one root node and the arena behind
/// every `NodeId` the cache holds.
pub(crate) struct Quadtree<K, V, S = DefaultHashBuilder> {
    arena: NodeArena<K, V, S>,
    root: Option<NodeId>,
    reclaimed: Vec<ReclaimedNode<K>>,
    hasher: S,
}

impl<K, V, S> Quadtree<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Creates an empty tree. Each node's entry map is built from a clone
    /// of `hasher`.
    pub(crate) fn new(hasher: S) -> Self {
        Quadtree {
            arena: NodeArena::new(),
            root: None,
            reclaimed: Vec::new(),
            hasher,
        }
    }

    /// Id of the root node, if the tree is non-empty.
    #[cfg(test)]
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Creates and inserts a new node at the given point, descending the
    /// quadrants until a free slot is found.
    ///
    /// Must not be called for a point that already has a node; the cache
    /// reuses existing nodes through its point index.
    pub(crate) fn insert(&mut self, priority: Priority, expiry: Time) -> NodeId {
        let Some(mut current) = self.root else {
            let id = self.alloc_node(expiry, priority, ParentSlot::Root);
            self.root = Some(id);
            return id;
        };

        loop {
            let node = &self.arena[current];
            let quadrant =
                Quadrant::from_components(expiry <= node.expiry, priority < node.priority);
            let slot = node.quadrants[quadrant.index()];
            match slot {
                Some(child) => current = child,
                None => {
                    let id = self.alloc_node(expiry, priority, ParentSlot::Interior(current));
                    self.arena[current].quadrants[quadrant.index()] = Some(id);
                    return id;
                }
            }
        }
    }

    /// Adds an entry to the node's bucket. See [`Node::add_entry`].
    pub(crate) fn add_entry(&mut self, id: NodeId, key: K, value: V, now: Time) {
        self.arena[id].add_entry(key, value, now);
    }

    /// Reads and re-stamps an entry. See [`Node::access_entry`].
    pub(crate) fn access_entry<Q>(&mut self, id: NodeId, key: &Q, now: Time) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.arena[id].access_entry(key, now)
    }

    /// Removes an entry from a node, then lets the cleaning rule decide
    /// whether the node itself can leave the tree.
    pub(crate) fn remove_entry<Q>(&mut self, id: NodeId, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let value = self.arena[id].remove_entry(key);
        if value.is_some() {
            self.clean(id);
        }
        value
    }

    /// Returns true if the node's point has expired at `now`.
    pub(crate) fn expired(&self, id: NodeId, now: Time) -> bool {
        self.arena[id].expired(now)
    }

    /// Returns true if the node currently holds an entry for `key`.
    pub(crate) fn contains_entry<Q>(&self, id: NodeId, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.arena[id].contains_entry(key)
    }

    /// Removes every entry whose node has expired, and every expired node
    /// the cleaning rule allows to leave the tree. Returns the number of
    /// entries removed (zero means nothing but structure changed).
    pub(crate) fn prune_expired(&mut self, now: Time) -> usize {
        match self.root {
            Some(root) => self.prune_expired_at(root, now),
            None => 0,
        }
    }

    fn prune_expired_at(&mut self, id: NodeId, now: Time) -> usize {
        let mut removed = 0;

        if self.arena[id].expired(now) {
            // Older-or-equal-expiry subtrees are wholly expired: every
            // descendant there has expiry <= this node's expiry < now.
            for quadrant in Quadrant::OLDER {
                if let Some(child) = self.arena[id].quadrants[quadrant.index()].take() {
                    removed += self.detach_subtree(child);
                }
            }

            // Newer-expiry children outlive this node, but their own
            // older-side descendants may still be expired.
            for quadrant in Quadrant::NEWER {
                if let Some(child) = self.arena[id].quadrants[quadrant.index()] {
                    removed += self.prune_expired_at(child, now);
                }
            }

            removed += self.arena[id].clear_entries();
        }

        // Older-or-equal children of a non-expired node may themselves be
        // expired. (After the expired branch these slots are empty, so
        // this only recurses for live nodes.)
        for quadrant in Quadrant::OLDER {
            if let Some(child) = self.arena[id].quadrants[quadrant.index()] {
                removed += self.prune_expired_at(child, now);
            }
        }

        self.clean(id);

        removed
    }

    /// Removes the least recently used entry among those with the lowest
    /// priority (numerically largest value) anywhere in the tree, and
    /// returns its key. Returns `None` when the tree holds no entries.
    ///
    /// Best-first search: higher-priority quadrants of a non-empty node
    /// can never beat it on priority and are skipped; empty pivots are
    /// traversed through in every direction.
    pub(crate) fn prune_lowest_priority(&mut self) -> Option<K> {
        let root = self.root?;
        let mut lowest = root;
        let mut stack: Vec<NodeId> = Vec::new();

        let root_node = &self.arena[root];
        if root_node.is_empty() {
            // No priority bound yet, so every direction may hold the victim.
            stack.extend(root_node.quadrants.into_iter().flatten());
        } else {
            for quadrant in Quadrant::LOWER {
                if let Some(child) = root_node.quadrants[quadrant.index()] {
                    stack.push(child);
                }
            }
        }

        while let Some(id) = stack.pop() {
            let node = &self.arena[id];
            if node.is_empty() {
                stack.extend(node.quadrants.into_iter().flatten());
                continue;
            }

            let lowest_node = &self.arena[lowest];
            if lowest_node.is_empty()
                || node.priority > lowest_node.priority
                || (node.priority == lowest_node.priority
                    && node.lru_time() < lowest_node.lru_time())
            {
                lowest = id;
            }

            let quads = self.arena[id].quadrants;
            for quadrant in Quadrant::LOWER {
                if let Some(child) = quads[quadrant.index()] {
                    stack.push(child);
                }
            }
        }

        if self.arena[lowest].is_empty() {
            return None;
        }

        let (key, _value) = self.arena[lowest].pop_lru_entry()?;
        self.clean(lowest);
        Some(key)
    }

    /// Hands over the nodes freed since the last drain. The cache erases
    /// the matching auxiliary index entries before updating anything else.
    pub(crate) fn drain_reclaimed(&mut self) -> Vec<ReclaimedNode<K>> {
        mem::take(&mut self.reclaimed)
    }

    fn alloc_node(&mut self, expiry: Time, priority: Priority, parent: ParentSlot) -> NodeId {
        self.arena
            .alloc(Node::new(expiry, priority, parent, self.hasher.clone()))
    }

    /// The quadrant of `parent` that `child`'s point belongs to.
    fn quadrant_for(&self, parent: NodeId, child: NodeId) -> Quadrant {
        let p = &self.arena[parent];
        let c = &self.arena[child];
        Quadrant::from_components(c.expiry <= p.expiry, c.priority < p.priority)
    }

    /// Places `child` into the slot computed from its point, overwriting
    /// the previous occupant, and updates `child`'s parent capability.
    ///
    /// Every node in a promoted child's subtree satisfied the old
    /// occupant's quadrant constraint, so the computed slot is always the
    /// slot the old occupant held.
    fn attach(&mut self, parent: ParentSlot, child: NodeId) {
        match parent {
            ParentSlot::Root => {
                self.root = Some(child);
                self.arena[child].parent = ParentSlot::Root;
            }
            ParentSlot::Interior(parent_id) => {
                let quadrant = self.quadrant_for(parent_id, child);
                self.arena[parent_id].quadrants[quadrant.index()] = Some(child);
                self.arena[child].parent = ParentSlot::Interior(parent_id);
            }
        }
    }

    /// Unlinks `child` from its parent's quadrant slot (or the root slot).
    fn remove_child(&mut self, parent: ParentSlot, child: NodeId) {
        match parent {
            ParentSlot::Root => {
                debug_assert_eq!(self.root, Some(child));
                self.root = None;
            }
            ParentSlot::Interior(parent_id) => {
                let quadrant = self.quadrant_for(parent_id, child);
                self.arena[parent_id].quadrants[quadrant.index()] = None;
            }
        }
    }

    /// The cleaning rule, run after a node loses entries.
    ///
    /// An empty node with no children leaves the tree; an empty node with
    /// exactly one child is replaced by it (the only rotation performed);
    /// an empty node separating two or more subtrees stays as a pivot.
    fn clean(&mut self, id: NodeId) {
        if !self.arena[id].is_empty() {
            return;
        }

        let node = &self.arena[id];
        let parent = node.parent;
        let mut children = node.quadrants.into_iter().flatten();
        let first = children.next();
        let second = children.next();

        match (first, second) {
            (None, _) => {
                self.remove_child(parent, id);
                self.free(id);
            }
            (Some(child), None) => {
                self.attach(parent, child);
                self.free(id);
            }
            _ => {}
        }
    }

    /// Frees a whole subtree, returning how many entries it still held.
    fn detach_subtree(&mut self, id: NodeId) -> usize {
        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            stack.extend(self.arena[current].quadrants.into_iter().flatten());
            removed += self.free(current);
        }
        removed
    }

    /// Returns a node to the arena and logs its point and surviving keys
    /// for the cache to reconcile. Returns the node's entry count.
    fn free(&mut self, id: NodeId) -> usize {
        let node = self.arena.take(id);
        let expiry = node.expiry;
        let priority = node.priority;
        let (count, keys) = node.reclaim();
        self.reclaimed.push(ReclaimedNode {
            id,
            expiry,
            priority,
            keys,
        });
        count
    }
}
