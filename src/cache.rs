//! Priority-Expiry Cache
//!
//! A bounded in-memory key-value store whose eviction order is driven
//! first by *expiry* (entries past their expiry time leave first), then by
//! *priority* (lower-priority entries leave next), and, among equally low
//! priorities, by *least-recently-used* timestamp.
//!
//! # How It Works
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     PriorityExpiryCache                          │
//! │                                                                  │
//! │  key_index: K ─────────────▶ NodeId                              │
//! │  point_index: (expiry, priority) ─▶ NodeId                       │
//! │                                                                  │
//! │                    Quadtree over (expiry, priority)              │
//! │                          ┌─────────┐                             │
//! │                          │ (e, p)  │  each node: all entries     │
//! │                      ┌───┴────┬────┴───┐  at one point, in an    │
//! │                   older     older    newer  LRU queue            │
//! │                   higher    lower    lower                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `set` finds (or creates) the node for the entry's (expiry, priority)
//! point through `point_index` and appends to that node's LRU queue.
//! `get` routes through `key_index` and re-stamps the entry. `evict`
//! first sweeps expired nodes; only when that removes nothing does it
//! hunt down the lowest-priority LRU entry.
//!
//! Both indices are kept exact: whenever the tree frees a node, the node's
//! point and any keys it still held are reported back and erased here
//! before anything else happens.
//!
//! # Operations
//!
//! | Operation | Action | Time |
//! |-----------|--------|------|
//! | `get(key)` | Bump entry to MRU of its node | O(1) |
//! | `set(key, value)` | Append to the point's node (created on miss) | O(1), O(depth) on node miss |
//! | `delete(key)` | Unlink entry, collapse node if possible | O(1) |
//! | `evict()` | Expiry sweep, else lowest-priority LRU pop | O(log E + log P) expected |
//! | `len()` / `keys()` | Filtered walk over the key index | O(n) |
//!
//! # Eviction Is Explicit
//!
//! The cache never evicts on insert. Callers decide when to shed load and
//! call [`PriorityExpiryCache::evict`]; each call removes either every
//! expired entry, or exactly one lowest-priority entry.
//!
//! # Thread Safety
//!
//! `PriorityExpiryCache` is **not** thread-safe; every mutation takes
//! `&mut self`. Wrap it in a `Mutex`, or use
//! `ConcurrentPriorityExpiryCache` (requires the `concurrent` feature).
//!
//! # Examples
//!
//! ```
//! use pec_rs::config::PriorityExpiryCacheConfig;
//! use pec_rs::{CacheError, ManualClock, PriorityExpiryCache};
//! use core::num::NonZeroU64;
//!
//! let config = PriorityExpiryCacheConfig {
//!     default_expiry_duration: NonZeroU64::new(100).unwrap(),
//!     default_priority: 0,
//! };
//! let clock = ManualClock::new(0);
//! let mut cache = PriorityExpiryCache::init(config, clock.clone(), None);
//!
//! cache.set("a", 1);
//! assert_eq!(cache.get(&"a"), Ok(&1));
//!
//! // Past the expiry the entry is still indexed, but unreadable...
//! clock.advance(200);
//! assert_eq!(cache.get(&"a"), Err(CacheError::KeyExpired));
//!
//! // ...until an eviction pass reclaims it.
//! cache.evict();
//! assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
//! ```

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroU64;
use core::ops::{Deref, DerefMut};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

use crate::clock::Clock;
use crate::config::PriorityExpiryCacheConfig;
use crate::error::CacheError;
use crate::metrics::PriorityExpiryCacheMetrics;
use crate::node::NodeId;
use crate::tree::Quadtree;
use crate::{Priority, Time};

/// A cache evicting by expiry, then priority, then least-recent use.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone` (keys are stored
///   in the entry and in the key index).
/// - `V`: Value type.
/// - `C`: Clock source; see [`Clock`].
/// - `S`: Hash builder. Defaults to `DefaultHashBuilder`.
///
/// # Example
///
/// ```
/// use pec_rs::config::PriorityExpiryCacheConfig;
/// use pec_rs::{ManualClock, PriorityExpiryCache};
/// use core::num::NonZeroU64;
///
/// let config = PriorityExpiryCacheConfig {
///     default_expiry_duration: NonZeroU64::new(1_000).unwrap(),
///     default_priority: 0,
/// };
/// let mut cache = PriorityExpiryCache::init(config, ManualClock::new(0), None);
///
/// // Low-priority entries only survive while nothing wants their slot.
/// {
///     let mut scoped = cache.context(Some(7), None);
///     scoped.set("reconstructible", 1);
/// }
/// cache.set("important", 2);
///
/// cache.evict();
/// assert!(cache.get(&"reconstructible").is_err());
/// assert_eq!(cache.get(&"important"), Ok(&2));
/// ```
pub struct PriorityExpiryCache<K, V, C, S = DefaultHashBuilder> {
    config: PriorityExpiryCacheConfig,
    clock: C,
    tree: Quadtree<K, V, S>,
    key_index: HashMap<K, NodeId, S>,
    point_index: HashMap<(Time, Priority), NodeId, S>,
    context_priority: Priority,
    context_expiry_duration: NonZeroU64,
    metrics: PriorityExpiryCacheMetrics,
}

impl<K, V, C> PriorityExpiryCache<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Creates a cache from a configuration, a clock, and an optional
    /// hasher.
    ///
    /// # Arguments
    ///
    /// * `config` - Default expiry duration and priority for inserts
    /// * `clock` - Monotonic time source; every mutation reads it once
    /// * `hasher` - Optional custom hash builder. If `None`, uses
    ///   `DefaultHashBuilder`
    pub fn init(
        config: PriorityExpiryCacheConfig,
        clock: C,
        hasher: Option<DefaultHashBuilder>,
    ) -> Self {
        let hasher = hasher.unwrap_or_default();
        PriorityExpiryCache {
            config,
            clock,
            tree: Quadtree::new(hasher.clone()),
            key_index: HashMap::with_hasher(hasher.clone()),
            point_index: HashMap::with_hasher(hasher),
            context_priority: config.default_priority,
            context_expiry_duration: config.default_expiry_duration,
            metrics: PriorityExpiryCacheMetrics::new(),
        }
    }
}

impl<K, V, C, S> PriorityExpiryCache<K, V, C, S>
where
    K: Hash + Eq + Clone,
    C: Clock,
    S: BuildHasher + Clone,
{
    /// Number of live entries: indexed, unexpired, and still present in
    /// their node. Walks the key index; prefer tracking sizes externally
    /// if you need this in a hot path.
    pub fn len(&self) -> usize {
        self.keys().count()
    }

    /// Returns `true` if the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }

    /// Iterates over the keys of live entries.
    ///
    /// The expiry filter uses a single clock snapshot taken when the
    /// iterator is created. Iteration does not bump LRU positions.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        let now = self.clock.now();
        self.key_index.iter().filter_map(move |(key, &id)| {
            (!self.tree.expired(id, now) && self.tree.contains_entry(id, key)).then_some(key)
        })
    }

    /// Returns `true` if `key` has a live (unexpired) entry. Does not
    /// bump the entry's LRU position.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.key_index.get(key) {
            Some(&id) => {
                !self.tree.expired(id, self.clock.now()) && self.tree.contains_entry(id, key)
            }
            None => false,
        }
    }

    /// Counters describing the cache's behaviour so far.
    pub fn metrics(&self) -> &PriorityExpiryCacheMetrics {
        &self.metrics
    }

    /// Retrieves the value for `key`, re-stamping the entry as most
    /// recently used.
    ///
    /// # Errors
    ///
    /// - [`CacheError::KeyMissing`] - no entry for this key
    /// - [`CacheError::KeyExpired`] - the entry exists but its expiry has
    ///   passed and no eviction pass has reclaimed it yet
    pub fn get<Q>(&mut self, key: &Q) -> Result<&V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some(&id) = self.key_index.get(key) else {
            self.metrics.record_miss();
            return Err(CacheError::KeyMissing);
        };

        let now = self.clock.now();
        if self.tree.expired(id, now) {
            self.metrics.record_expired();
            return Err(CacheError::KeyExpired);
        }

        match self.tree.access_entry(id, key, now) {
            Some(value) => {
                self.metrics.record_hit();
                Ok(value)
            }
            None => {
                // The node survived as a pivot after its entries were
                // cleared; the key is effectively gone.
                self.metrics.record_miss();
                Err(CacheError::KeyMissing)
            }
        }
    }

    /// Inserts or overwrites the entry for `key`.
    ///
    /// The entry's expiry is `now + expiry_duration` and its priority is
    /// taken from the active insertion context (or the configured
    /// defaults). Overwriting re-places the entry at the context's
    /// current (expiry, priority) point, not the old one.
    ///
    /// Never evicts; see [`PriorityExpiryCache::evict`].
    pub fn set(&mut self, key: K, value: V) {
        let now = self.clock.now();
        let expiry = now.saturating_add(self.context_expiry_duration.get());
        debug_assert!(expiry > now);
        let priority = self.context_priority;

        if let Some(id) = self.key_index.remove(&key) {
            // Overwrite: drop the old entry wherever it lives. A key
            // stranded in a cleared pivot has no entry left; that is fine.
            let _ = self.tree.remove_entry(id, &key);
            self.reconcile();
        }

        let point = (expiry, priority);
        let id = match self.point_index.get(&point) {
            Some(&id) => id,
            None => {
                let id = self.tree.insert(priority, expiry);
                self.point_index.insert(point, id);
                id
            }
        };

        self.tree.add_entry(id, key.clone(), value, now);
        self.key_index.insert(key, id);
        self.metrics.record_insertion();
    }

    /// Removes the entry for `key` and returns its value.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyMissing`] when there is no entry, including when
    /// the key's node was cleared as an expired pivot.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some(id) = self.key_index.remove(key) else {
            return Err(CacheError::KeyMissing);
        };
        let value = self.tree.remove_entry(id, key);
        self.reconcile();
        value.ok_or(CacheError::KeyMissing)
    }

    /// Evicts from the cache.
    ///
    /// First sweeps expired entries; if the sweep removed anything, that
    /// is the whole pass. Otherwise removes the least recently used entry
    /// among those with the lowest priority. A call on an empty (or
    /// wholly structural) tree is a no-op.
    ///
    /// If several lowest-priority entries share the same `last_used`
    /// tick, which of them is removed is unspecified.
    pub fn evict(&mut self) {
        let now = self.clock.now();
        let expired = self.tree.prune_expired(now);
        self.reconcile();
        if expired > 0 {
            self.metrics.record_expired_evictions(expired as u64);
            return;
        }

        if let Some(key) = self.tree.prune_lowest_priority() {
            self.reconcile();
            // The victim left its node's data map when it was popped, so
            // even if that emptied the node, the reclaim drain above never
            // saw this key. This is the only place its key_index entry is
            // erased.
            self.key_index.remove(&key);
            self.metrics.record_priority_eviction();
        }
    }

    /// Opens an insertion-context scope overriding the priority and/or
    /// expiry duration used by `set`.
    ///
    /// `None` for a field re-asserts the configured default, not the
    /// value of any enclosing scope. Dropping the guard restores whatever
    /// was active before this call, so scopes nest properly.
    ///
    /// # Example
    ///
    /// ```
    /// use pec_rs::config::PriorityExpiryCacheConfig;
    /// use pec_rs::{ManualClock, PriorityExpiryCache};
    /// use core::num::NonZeroU64;
    ///
    /// let config = PriorityExpiryCacheConfig {
    ///     default_expiry_duration: NonZeroU64::new(1_000).unwrap(),
    ///     default_priority: 0,
    /// };
    /// let mut cache = PriorityExpiryCache::init(config, ManualClock::new(0), None);
    ///
    /// {
    ///     let mut scoped = cache.context(Some(10), NonZeroU64::new(60));
    ///     scoped.set("volatile", 1);
    /// }
    /// // Defaults are back in force here.
    /// cache.set("durable", 2);
    /// ```
    pub fn context(
        &mut self,
        priority: Option<Priority>,
        expiry_duration: Option<NonZeroU64>,
    ) -> ContextGuard<'_, K, V, C, S> {
        let saved_priority = self.context_priority;
        let saved_expiry_duration = self.context_expiry_duration;
        self.context_priority = priority.unwrap_or(self.config.default_priority);
        self.context_expiry_duration =
            expiry_duration.unwrap_or(self.config.default_expiry_duration);
        ContextGuard {
            saved_priority,
            saved_expiry_duration,
            cache: self,
        }
    }

    /// Erases index entries for every node the tree has freed since the
    /// last drain. Must run after any tree mutation, before new index
    /// entries are written.
    ///
    /// Entries are only erased while they still map to the freed node's
    /// id: a key that was stranded in a cleared pivot and then re-set
    /// lives in a different node by now and must survive the pivot's
    /// eventual reclamation.
    fn reconcile(&mut self) {
        for reclaimed in self.tree.drain_reclaimed() {
            let point = (reclaimed.expiry, reclaimed.priority);
            if self.point_index.get(&point) == Some(&reclaimed.id) {
                self.point_index.remove(&point);
            }
            for key in reclaimed.keys {
                if self.key_index.get(&key) == Some(&reclaimed.id) {
                    self.key_index.remove(&key);
                }
            }
        }
    }
}

impl<K, V, C, S> fmt::Debug for PriorityExpiryCache<K, V, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityExpiryCache")
            .field("keys", &self.key_index.len())
            .field("points", &self.point_index.len())
            .field("context_priority", &self.context_priority)
            .field("context_expiry_duration", &self.context_expiry_duration)
            .finish()
    }
}

/// Scope guard for an insertion context.
///
/// Dereferences to the cache, so `set` (and everything else) can be
/// called on the guard directly. Dropping the guard restores the context
/// that was active when [`PriorityExpiryCache::context`] was called; this
/// holds on every exit path, including panics unwinding through the
/// scope.
pub struct ContextGuard<'a, K, V, C, S = DefaultHashBuilder> {
    cache: &'a mut PriorityExpiryCache<K, V, C, S>,
    saved_priority: Priority,
    saved_expiry_duration: NonZeroU64,
}

impl<K, V, C, S> Deref for ContextGuard<'_, K, V, C, S> {
    type Target = PriorityExpiryCache<K, V, C, S>;

    fn deref(&self) -> &Self::Target {
        self.cache
    }
}

impl<K, V, C, S> DerefMut for ContextGuard<'_, K, V, C, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cache
    }
}

impl<K, V, C, S> Drop for ContextGuard<'_, K, V, C, S> {
    fn drop(&mut self) {
        self.cache.context_priority = self.saved_priority;
        self.cache.context_expiry_duration = self.saved_expiry_duration;
    }
}

impl<K, V, C, S> fmt::Debug for ContextGuard<'_, K, V, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("saved_priority", &self.saved_priority)
            .field("saved_expiry_duration", &self.saved_expiry_duration)
            .finish()
    }
}
