//! Cache Metrics
//!
//! Counters for cache behaviour, reported through BTreeMap so the output
//! order is deterministic: essential when metrics are diffed in tests or
//! compared across runs.
//!
//! The interesting split for this cache is *why* entries leave: expiry
//! sweeps and priority eviction are separate counters, since a workload
//! dominated by expirations behaves very differently from one under
//! priority pressure.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Trait implemented by cache metrics holders for uniform reporting.
///
/// Uses BTreeMap to ensure deterministic ordering of metrics, which is
/// essential for reproducible benchmarks and consistent test output.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Algorithm name for identification.
    fn algorithm_name(&self) -> &'static str;
}

/// Counters tracked by a [`PriorityExpiryCache`](crate::PriorityExpiryCache).
#[derive(Debug, Default, Clone)]
pub struct PriorityExpiryCacheMetrics {
    /// Total number of lookups made against the cache.
    pub requests: u64,

    /// Lookups that found a live entry.
    pub hits: u64,

    /// Lookups that found only an expired entry.
    pub expired: u64,

    /// Entries written into the cache (including overwrites).
    pub insertions: u64,

    /// Entries removed because their node's expiry had passed.
    pub expired_evictions: u64,

    /// Entries removed as lowest-priority victims.
    pub priority_evictions: u64,
}

impl PriorityExpiryCacheMetrics {
    /// Creates a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup that found a live entry.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }

    /// Records a lookup that found nothing.
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Records a lookup that found only an expired entry.
    pub fn record_expired(&mut self) {
        self.requests += 1;
        self.expired += 1;
    }

    /// Records a write into the cache.
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    /// Records `count` entries removed by an expiry sweep.
    pub fn record_expired_evictions(&mut self, count: u64) {
        self.expired_evictions += count;
    }

    /// Records one entry removed as a lowest-priority victim.
    pub fn record_priority_eviction(&mut self) {
        self.priority_evictions += 1;
    }

    /// Lookups that found neither a live nor an expired entry.
    pub fn misses(&self) -> u64 {
        self.requests - self.hits - self.expired
    }

    /// Fraction of lookups that hit, between 0.0 and 1.0. Zero when no
    /// lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("hits".to_string(), self.hits as f64);
        metrics.insert("misses".to_string(), self.misses() as f64);
        metrics.insert("expired".to_string(), self.expired as f64);
        metrics.insert("hit_rate".to_string(), self.hit_rate());

        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert(
            "expired_evictions".to_string(),
            self.expired_evictions as f64,
        );
        metrics.insert(
            "priority_evictions".to_string(),
            self.priority_evictions as f64,
        );

        metrics
    }
}

impl CacheMetrics for PriorityExpiryCacheMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "PRIORITY-EXPIRY"
    }
}
