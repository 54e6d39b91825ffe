#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Eviction Order
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     What does evict() remove?                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Any entries past their expiry time?                             │
//! │        │                                                         │
//! │   Yes  │  No                                                     │
//! │    │   │                                                         │
//! │    ▼   ▼                                                         │
//! │  ┌───────────────┐   ┌────────────────────────────────────────┐  │
//! │  │ All expired   │   │ The least recently used entry among    │  │
//! │  │ entries leave │   │ those with the lowest priority leaves  │  │
//! │  └───────────────┘   └────────────────────────────────────────┘  │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PriorityExpiryCache`] | The cache: set/get/delete/evict plus insertion contexts |
//! | [`PriorityExpiryCacheConfig`] | Default expiry duration and priority |
//! | [`ManualClock`] | Hand-advanced clock for tests and simulations |
//! | [`MonotonicClock`](clock::MonotonicClock) | Nanosecond monotonic clock (`std` feature) |
//! | [`CacheError`] | `KeyMissing` / `KeyExpired` lookup failures |
//! | [`PriorityExpiryCacheMetrics`] | Hit/miss/eviction counters |
//!
//! ## Basic Usage
//!
//! ```rust
//! use pec_rs::config::PriorityExpiryCacheConfig;
//! use pec_rs::{ManualClock, PriorityExpiryCache};
//! use core::num::NonZeroU64;
//!
//! let config = PriorityExpiryCacheConfig {
//!     default_expiry_duration: NonZeroU64::new(1_000).unwrap(),
//!     default_priority: 0,
//! };
//! let clock = ManualClock::new(0);
//! let mut cache = PriorityExpiryCache::init(config, clock.clone(), None);
//!
//! cache.set("user:1", "alice");
//! assert_eq!(cache.get(&"user:1"), Ok(&"alice"));
//!
//! // Priority 9 marks an entry as the first to shed under pressure.
//! {
//!     let mut scoped = cache.context(Some(9), None);
//!     scoped.set("thumbnail:1", "...");
//! }
//!
//! cache.evict();
//! assert!(cache.get(&"thumbnail:1").is_err());
//! assert!(cache.get(&"user:1").is_ok());
//! ```
//!
//! ## Concurrent Cache
//!
//! Enable the `concurrent` feature for a thread-safe wrapper:
//!
//! ```toml
//! [dependencies]
//! pec-rs = { version = "0.1", features = ["concurrent"] }
//! ```
//!
//! Eviction order is global, so the wrapper is a single mutex around the
//! cache rather than a striped segment pool; see the
//! [`concurrent`] module docs for the reasoning.
//!
//! ## Modules
//!
//! - [`cache`]: The priority-expiry cache and its insertion-context guard
//! - [`clock`]: The clock contract and the provided clock sources
//! - [`config`]: Configuration structure
//! - [`error`]: Caller-visible error type
//! - [`metrics`]: Metrics collection for cache behaviour monitoring
//! - [`concurrent`]: Thread-safe wrapper (requires the `concurrent` feature)

#![no_std]

/// The priority-expiry cache façade.
///
/// Drives inserts and lookups through two auxiliary indices, orchestrates
/// eviction over the quadtree, and scopes priority/expiry overrides with
/// an RAII guard.
pub mod cache;

/// Clock sources.
///
/// The cache reads time as a non-decreasing integer through the
/// [`Clock`] trait; implementations for manual and monotonic time are
/// provided.
pub mod clock;

/// Cache configuration structure.
pub mod config;

/// Caller-visible error type for the mapping surface.
pub mod error;

/// Cache metrics system.
///
/// Counters for hits, misses, expired lookups, and the two eviction
/// paths, reported in deterministic order.
pub mod metrics;

/// Cache entry type.
///
/// A (key, value, last_used) triple ordered by `last_used`. Internal
/// infrastructure; entries never leave their owning node.
pub(crate) mod entry;

/// The per-node LRU queue: a sentinel-bracketed doubly linked chain with
/// O(1) unlink and move-to-front through held pointers.
///
/// Internal infrastructure: it exposes unsafe raw pointer operations that
/// require careful invariant maintenance. Use the cache's surface
/// instead.
pub(crate) mod list;

/// Quadtree node: the bucket of all entries at one (expiry, priority)
/// point. Internal infrastructure.
pub(crate) mod node;

/// The point quadtree over the (expiry, priority) plane, with the expiry
/// sweep and the lowest-priority search. Internal infrastructure.
pub(crate) mod tree;

/// Thread-safe cache wrapper.
///
/// Available when the `concurrent` feature is enabled.
#[cfg(feature = "concurrent")]
pub mod concurrent;

// Re-export the cache types
pub use cache::{ContextGuard, PriorityExpiryCache};

// Re-export the clock sources
pub use clock::{Clock, ManualClock};
#[cfg(feature = "std")]
pub use clock::MonotonicClock;

// Re-export configuration, errors and metrics
pub use config::PriorityExpiryCacheConfig;
pub use error::CacheError;
pub use metrics::{CacheMetrics, PriorityExpiryCacheMetrics};

#[cfg(feature = "concurrent")]
pub use concurrent::ConcurrentPriorityExpiryCache;

/// An integer tick from the cache's clock.
///
/// Absolute expiry times and `last_used` stamps are both expressed in
/// these ticks. The unit is whatever the clock produces (nanoseconds for
/// [`MonotonicClock`](clock::MonotonicClock)); the cache only compares
/// and adds them.
pub type Time = u64;

/// The priority of a cache entry.
///
/// **Lower value = higher priority.** Eviction removes entries with the
/// numerically largest priority first. Signed so that callers can rank
/// entries above a default of 0.
pub type Priority = i64;
