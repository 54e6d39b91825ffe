//! Clock Sources
//!
//! The cache reads time as a plain non-decreasing integer through the
//! [`Clock`] trait. Keeping time integral matters: timestamps are compared
//! for equality and ordering throughout the LRU machinery, and floats
//! would break both.
//!
//! Two implementations are provided:
//!
//! - [`ManualClock`]: advanced by hand; for tests, simulations, and any
//!   caller that already has its own notion of time. Available everywhere,
//!   including `no_std`.
//! - [`MonotonicClock`]: nanoseconds from a monotonic origin (requires
//!   the `std` feature).
//!
//! # Contract
//!
//! A clock must never go backwards. Calling it twice within one operation
//! may return the same tick; entries set or accessed on the same tick are
//! ordered by operation order, which the cache preserves internally.

extern crate alloc;

use alloc::rc::Rc;
use core::cell::Cell;

use crate::Time;

/// A source of non-decreasing integer time.
pub trait Clock {
    /// Returns the current tick. Must never decrease between calls.
    fn now(&self) -> Time;
}

/// A clock that only moves when told to.
///
/// Clones share the underlying tick, so a caller can keep a handle and
/// advance time while the cache owns its own copy:
///
/// ```
/// use pec_rs::{Clock, ManualClock};
///
/// let clock = ManualClock::new(0);
/// let handle = clock.clone();
///
/// handle.advance(10);
/// assert_eq!(clock.now(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    tick: Rc<Cell<Time>>,
}

impl ManualClock {
    /// Creates a clock starting at the given tick.
    pub fn new(start: Time) -> Self {
        ManualClock {
            tick: Rc::new(Cell::new(start)),
        }
    }

    /// Moves the clock forward by `ticks`.
    pub fn advance(&self, ticks: Time) {
        self.tick.set(self.tick.get().saturating_add(ticks));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new(0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        self.tick.get()
    }
}

#[cfg(feature = "std")]
extern crate std;

/// Monotonic wall-clock ticks in nanoseconds since the clock was created.
///
/// Backed by [`std::time::Instant`], which is guaranteed never to go
/// backwards. This is the clock to use outside of tests.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Creates a clock whose tick zero is now.
    pub fn new() -> Self {
        MonotonicClock {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(Time::MAX)
    }
}
