//! Concurrent Priority-Expiry Cache
//!
//! A thread-safe wrapper around [`PriorityExpiryCache`] using a single
//! [`parking_lot::Mutex`].
//!
//! # Why One Lock
//!
//! Lock striping does not apply here: eviction order is *global* (the
//! expiry sweep and the lowest-priority search both consult the whole
//! tree), so segmenting the key space would change the eviction policy,
//! not just its performance. A single mutex around the façade preserves
//! the exact single-threaded semantics; every operation is short and
//! CPU-bound, so the critical sections are small.
//!
//! # Thread Safety
//!
//! `ConcurrentPriorityExpiryCache` is `Send + Sync` (given `Send` key,
//! value, and clock types) and can be shared via `Arc`. Note that
//! [`ManualClock`](crate::ManualClock) is not `Send`; use
//! [`MonotonicClock`](crate::clock::MonotonicClock) or your own `Send`
//! clock here.
//!
//! # Example
//!
//! ```rust,ignore
//! use pec_rs::config::PriorityExpiryCacheConfig;
//! use pec_rs::{ConcurrentPriorityExpiryCache, MonotonicClock};
//! use core::num::NonZeroU64;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let config = PriorityExpiryCacheConfig {
//!     default_expiry_duration: NonZeroU64::new(1_000_000_000).unwrap(),
//!     default_priority: 0,
//! };
//! let cache = Arc::new(ConcurrentPriorityExpiryCache::init(
//!     config,
//!     MonotonicClock::new(),
//!     None,
//! ));
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let cache = Arc::clone(&cache);
//!     thread::spawn(move || {
//!         for j in 0..1000 {
//!             cache.set(format!("key-{}-{}", i, j), j);
//!         }
//!     })
//! }).collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//! ```

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroU64;
use parking_lot::Mutex;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

use crate::cache::PriorityExpiryCache;
use crate::clock::Clock;
use crate::config::PriorityExpiryCacheConfig;
use crate::error::CacheError;
use crate::metrics::{CacheMetrics, PriorityExpiryCacheMetrics};
use crate::Priority;

/// A thread-safe priority-expiry cache.
///
/// All operations take `&self` and serialise on an internal mutex.
/// Reads return clones of the cached values, since a reference could not
/// outlive the critical section.
pub struct ConcurrentPriorityExpiryCache<K, V, C, S = DefaultHashBuilder> {
    inner: Mutex<PriorityExpiryCache<K, V, C, S>>,
}

impl<K, V, C> ConcurrentPriorityExpiryCache<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Creates a concurrent cache. See [`PriorityExpiryCache::init`].
    pub fn init(
        config: PriorityExpiryCacheConfig,
        clock: C,
        hasher: Option<DefaultHashBuilder>,
    ) -> Self {
        ConcurrentPriorityExpiryCache {
            inner: Mutex::new(PriorityExpiryCache::init(config, clock, hasher)),
        }
    }
}

impl<K, V, C, S> ConcurrentPriorityExpiryCache<K, V, C, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
    S: BuildHasher + Clone,
{
    /// Retrieves a clone of the value for `key`, re-stamping the entry as
    /// most recently used. See [`PriorityExpiryCache::get`].
    pub fn get<Q>(&self, key: &Q) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Inserts or overwrites the entry for `key`. See
    /// [`PriorityExpiryCache::set`].
    pub fn set(&self, key: K, value: V) {
        self.inner.lock().set(key, value);
    }

    /// Inserts with an explicit priority and/or expiry duration,
    /// equivalent to a one-shot insertion context around a single `set`.
    ///
    /// The guard-based [`PriorityExpiryCache::context`] cannot be exposed
    /// through a lock, so the scoped form collapses to per-call overrides
    /// here.
    pub fn set_with(
        &self,
        key: K,
        value: V,
        priority: Option<Priority>,
        expiry_duration: Option<NonZeroU64>,
    ) {
        let mut cache = self.inner.lock();
        let mut scoped = cache.context(priority, expiry_duration);
        scoped.set(key, value);
    }

    /// Removes the entry for `key` and returns its value. See
    /// [`PriorityExpiryCache::delete`].
    pub fn delete<Q>(&self, key: &Q) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().delete(key)
    }

    /// Evicts from the cache. See [`PriorityExpiryCache::evict`].
    pub fn evict(&self) {
        self.inner.lock().evict();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns `true` if `key` has a live entry.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().contains_key(key)
    }

    /// Snapshot of the keys of live entries.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Snapshot of the cache's metrics counters.
    pub fn metrics(&self) -> PriorityExpiryCacheMetrics {
        self.inner.lock().metrics().clone()
    }
}

impl<K, V, C, S> CacheMetrics for ConcurrentPriorityExpiryCache<K, V, C, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
    S: BuildHasher + Clone,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.inner.lock().metrics().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "PRIORITY-EXPIRY"
    }
}

impl<K, V, C, S> fmt::Debug for ConcurrentPriorityExpiryCache<K, V, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentPriorityExpiryCache").finish()
    }
}
