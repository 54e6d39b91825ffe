//! Cache Error Types
//!
//! Failures visible to callers of the mapping surface. Internal conditions
//! (an entry missing from a node, popping from an empty node, pruning an
//! empty tree) are represented as `Option` returns at their well-defined
//! call sites and either handled there or surfaced through these variants.

use thiserror::Error;

/// Errors returned by the cache's mapping operations.
///
/// A lookup can fail for two distinct reasons and callers often care
/// which: the key was never there (or has been evicted), or it is still
/// indexed but its node's expiry has passed without an eviction pass
/// reclaiming it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key has no entry in the cache.
    #[error("key does not exist in the cache")]
    KeyMissing,

    /// The key has an entry, but the entry's expiry time has passed.
    #[error("key exists in the cache but has expired")]
    KeyExpired,
}
