//! Cache Configuration
//!
//! Construction goes through a single configuration struct, so new
//! parameters can be added without breaking existing callers, and so a
//! config can be built once and reused across caches.

use core::fmt;
use core::num::NonZeroU64;

use crate::Priority;

/// Configuration for a [`PriorityExpiryCache`](crate::PriorityExpiryCache).
///
/// The expiry duration is a [`NonZeroU64`], which makes the "every entry
/// expires strictly after it is set" rule unrepresentable to violate
/// rather than merely asserted.
///
/// # Examples
///
/// ```
/// use pec_rs::config::PriorityExpiryCacheConfig;
/// use core::num::NonZeroU64;
///
/// let config = PriorityExpiryCacheConfig {
///     default_expiry_duration: NonZeroU64::new(1_000_000_000).unwrap(),
///     default_priority: 0,
/// };
///
/// assert_eq!(config.default_priority, 0);
/// ```
#[derive(Clone, Copy)]
pub struct PriorityExpiryCacheConfig {
    /// Ticks after which an entry expires, counted from when it was set.
    /// Applies to every `set` outside an insertion context.
    pub default_expiry_duration: NonZeroU64,

    /// Priority given to entries set outside an insertion context.
    /// Lower value = higher priority.
    pub default_priority: Priority,
}

impl PriorityExpiryCacheConfig {
    /// Creates a configuration with the given defaults.
    pub fn new(default_expiry_duration: NonZeroU64, default_priority: Priority) -> Self {
        Self {
            default_expiry_duration,
            default_priority,
        }
    }
}

impl fmt::Debug for PriorityExpiryCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityExpiryCacheConfig")
            .field("default_expiry_duration", &self.default_expiry_duration)
            .field("default_priority", &self.default_priority)
            .finish()
    }
}
