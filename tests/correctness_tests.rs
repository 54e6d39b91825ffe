//! Correctness Tests for the Priority-Expiry Cache
//!
//! Validates the eviction policy end to end using small, deterministic
//! caches driven by a manual clock. Each eviction test explicitly checks
//! which keys disappeared and which survived.
//!
//! ## Test Strategy
//! - Small entry counts for predictable behavior
//! - A `ManualClock` handle shared with the cache so time only moves when
//!   a test says so
//! - Explicit checks after each `evict()` call: expired entries leave
//!   first, then the lowest-priority least-recently-used entry

use core::num::NonZeroU64;
use pec_rs::config::PriorityExpiryCacheConfig;
use pec_rs::{CacheError, ManualClock, Priority, PriorityExpiryCache};

type TestCache = PriorityExpiryCache<&'static str, u32, ManualClock>;

/// Helper to create a cache with the given default expiry duration and
/// priority, handing back the clock handle for the test to advance.
fn make_cache(expiry_duration: u64, priority: Priority) -> (TestCache, ManualClock) {
    let clock = ManualClock::new(0);
    let config = PriorityExpiryCacheConfig {
        default_expiry_duration: NonZeroU64::new(expiry_duration).unwrap(),
        default_priority: priority,
    };
    let cache = PriorityExpiryCache::init(config, clock.clone(), None);
    (cache, clock)
}

/// Helper to set a key under a one-shot insertion context.
fn set_with(
    cache: &mut TestCache,
    key: &'static str,
    value: u32,
    priority: Option<Priority>,
    expiry_duration: Option<u64>,
) {
    let mut scoped = cache.context(priority, expiry_duration.and_then(NonZeroU64::new));
    scoped.set(key, value);
}

// ============================================================================
// MAPPING SURFACE
// ============================================================================

#[test]
fn test_set_and_get() {
    let (mut cache, _clock) = make_cache(100, 0);
    cache.set("a", 1);
    assert_eq!(cache.get(&"a"), Ok(&1));
}

#[test]
fn test_get_twice_without_mutation() {
    let (mut cache, _clock) = make_cache(100, 0);
    cache.set("a", 1);
    assert_eq!(cache.get(&"a"), Ok(&1));
    assert_eq!(cache.get(&"a"), Ok(&1));
}

#[test]
fn test_overwrite_returns_latest_value() {
    let (mut cache, _clock) = make_cache(100, 0);
    cache.set("a", 1);
    cache.set("a", 2);
    assert_eq!(cache.get(&"a"), Ok(&2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_delete_then_get_fails() {
    let (mut cache, _clock) = make_cache(100, 0);
    cache.set("a", 1);
    assert_eq!(cache.delete(&"a"), Ok(1));
    assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
}

#[test]
fn test_delete_missing_key_fails() {
    let (mut cache, _clock) = make_cache(100, 0);
    assert_eq!(cache.delete(&"nope"), Err(CacheError::KeyMissing));
}

#[test]
fn test_set_and_get_multiple_values() {
    let (mut cache, _clock) = make_cache(100, 0);
    for (i, key) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        cache.set(key, i as u32);
    }
    for (i, key) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        assert_eq!(cache.get(&key), Ok(&(i as u32)));
    }
}

#[test]
fn test_len_matches_iteration() {
    let (mut cache, clock) = make_cache(10, 0);
    cache.set("a", 1);
    set_with(&mut cache, "b", 2, None, Some(100));
    set_with(&mut cache, "c", 3, Some(5), Some(100));

    assert_eq!(cache.len(), cache.keys().count());
    clock.advance(50);
    assert_eq!(cache.len(), cache.keys().count());
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_every_iterated_key_is_gettable() {
    let (mut cache, clock) = make_cache(10, 0);
    cache.set("short", 1);
    set_with(&mut cache, "long", 2, None, Some(100));
    clock.advance(50);

    let keys: Vec<&'static str> = cache.keys().copied().collect();
    for key in keys {
        assert!(cache.get(&key).is_ok());
    }
}

// ============================================================================
// EXPIRY EVICTION
// ============================================================================
// Expired entries always leave before any live entry is considered.

#[test]
fn test_evict_expired() {
    let (mut cache, clock) = make_cache(1, 0);
    cache.set("a", 1);
    set_with(&mut cache, "b", 2, None, Some(100));
    clock.advance(10);

    cache.evict();

    assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"b"), Ok(&2));
}

#[test]
fn test_evict_expired_removes_all_expired_at_once() {
    let (mut cache, clock) = make_cache(5, 0);
    cache.set("a", 1);
    cache.set("b", 2);
    set_with(&mut cache, "c", 3, Some(9), Some(3));
    set_with(&mut cache, "d", 4, None, Some(100));
    clock.advance(10);

    cache.evict();

    assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"b"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"c"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"d"), Ok(&4));
}

#[test]
fn test_expired_key_reads_as_expired_until_evicted() {
    let (mut cache, clock) = make_cache(5, 0);
    cache.set("a", 1);
    clock.advance(10);

    assert_eq!(cache.get(&"a"), Err(CacheError::KeyExpired));
    cache.evict();
    assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
}

// ============================================================================
// PRIORITY EVICTION
// ============================================================================
// With nothing expired, the numerically largest priority loses.

#[test]
fn test_evict_lowest_priority() {
    let (mut cache, _clock) = make_cache(1_000, 0);
    cache.set("a", 1);
    set_with(&mut cache, "b", 2, Some(7), None);

    cache.evict();

    assert_eq!(cache.get(&"a"), Ok(&1));
    assert_eq!(cache.get(&"b"), Err(CacheError::KeyMissing));
}

#[test]
fn test_evict_removes_one_priority_victim_per_call() {
    let (mut cache, _clock) = make_cache(1_000, 0);
    set_with(&mut cache, "low1", 1, Some(9), None);
    set_with(&mut cache, "low2", 2, Some(9), None);
    cache.set("high", 3);

    cache.evict();
    assert_eq!(cache.len(), 2);
    cache.evict();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"high"), Ok(&3));
}

#[test]
fn test_evict_twice_removes_two_lowest_priority_entries() {
    let (mut cache, _clock) = make_cache(1_000, 0);
    cache.set("p0", 0);
    set_with(&mut cache, "p5", 5, Some(5), None);
    set_with(&mut cache, "p7", 7, Some(7), None);
    set_with(&mut cache, "p9", 9, Some(9), None);

    cache.evict();
    cache.evict();

    assert!(cache.get(&"p9").is_err());
    assert!(cache.get(&"p7").is_err());
    assert_eq!(cache.get(&"p5"), Ok(&5));
    assert_eq!(cache.get(&"p0"), Ok(&0));
}

#[test]
fn test_negative_priority_outranks_default() {
    let (mut cache, _clock) = make_cache(1_000, 0);
    cache.set("default", 1);
    set_with(&mut cache, "critical", 2, Some(-1), None);

    cache.evict();

    assert_eq!(cache.get(&"critical"), Ok(&2));
    assert_eq!(cache.get(&"default"), Err(CacheError::KeyMissing));
}

// ============================================================================
// LRU TIE-BREAK
// ============================================================================

#[test]
fn test_lru_tie_break_on_equal_priority() {
    let (mut cache, clock) = make_cache(1_000, 7);
    cache.set("a", 1);
    cache.set("b", 2);
    clock.advance(1);

    // Accessing "a" makes "b" the least recently used
    assert_eq!(cache.get(&"a"), Ok(&1));
    cache.evict();

    assert_eq!(cache.get(&"b"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"a"), Ok(&1));
}

#[test]
fn test_lru_tie_break_across_nodes() {
    let (mut cache, clock) = make_cache(1_000, 0);
    // Same priority at two different expiry points: two separate nodes
    set_with(&mut cache, "stale", 1, Some(7), Some(500));
    clock.advance(1);
    set_with(&mut cache, "fresh", 2, Some(7), Some(600));

    cache.evict();

    assert_eq!(cache.get(&"stale"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"fresh"), Ok(&2));
}

#[test]
fn test_set_bumps_recency_like_get() {
    let (mut cache, clock) = make_cache(1_000, 7);
    cache.set("a", 1);
    cache.set("b", 2);
    clock.advance(1);

    // Overwriting "a" makes "b" the LRU victim
    cache.set("a", 10);
    cache.evict();

    assert_eq!(cache.get(&"b"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"a"), Ok(&10));
}

#[test]
fn test_same_tick_inserts_evict_in_insertion_order() {
    let (mut cache, _clock) = make_cache(1_000, 7);
    cache.set("first", 1);
    cache.set("second", 2);

    cache.evict();

    assert_eq!(cache.get(&"first"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"second"), Ok(&2));
}

// ============================================================================
// EXPIRY PRECEDES PRIORITY
// ============================================================================

#[test]
fn test_expired_entries_leave_before_any_priority_victim() {
    let (mut cache, clock) = make_cache(1_000, 0);
    set_with(&mut cache, "expired_low", 1, Some(9), Some(5));
    set_with(&mut cache, "live_low", 2, Some(9), Some(500));
    cache.set("live_high", 3);
    clock.advance(10);

    // First pass removes only the expired entry, sparing the live
    // lowest-priority one
    cache.evict();
    assert_eq!(cache.get(&"expired_low"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"live_low"), Ok(&2));
    assert_eq!(cache.get(&"live_high"), Ok(&3));

    // Second pass has nothing expired, so priority decides
    cache.evict();
    assert_eq!(cache.get(&"live_low"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"live_high"), Ok(&3));
}

#[test]
fn test_expired_high_priority_leaves_before_live_low_priority() {
    let (mut cache, clock) = make_cache(1_000, 0);
    set_with(&mut cache, "expired_high", 1, Some(0), Some(5));
    set_with(&mut cache, "live_low", 2, Some(9), Some(500));
    clock.advance(10);

    cache.evict();

    assert_eq!(cache.get(&"expired_high"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"live_low"), Ok(&2));
}

// ============================================================================
// STRUCTURAL PIVOTS
// ============================================================================
// An expired node separating two live subtrees is emptied but retained.

#[test]
fn test_pivot_expiry_spares_both_subtrees() {
    let (mut cache, clock) = make_cache(10, 0);
    set_with(&mut cache, "pivot", 1, Some(5), None);
    set_with(&mut cache, "high", 2, Some(0), Some(30));
    set_with(&mut cache, "low", 3, Some(9), Some(30));
    clock.advance(11);

    cache.evict();

    // The pivot's entry is gone but its node is structurally retained, so
    // the key still reads as expired rather than missing.
    assert_eq!(cache.get(&"pivot"), Err(CacheError::KeyExpired));
    assert_eq!(cache.get(&"high"), Ok(&2));
    assert_eq!(cache.get(&"low"), Ok(&3));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_pivot_subtree_expiry_promotes_the_other() {
    let (mut cache, clock) = make_cache(10, 0);
    set_with(&mut cache, "pivot", 1, Some(5), None);
    set_with(&mut cache, "short_side", 2, Some(0), Some(30));
    set_with(&mut cache, "long_side", 3, Some(9), Some(50));

    clock.advance(11);
    cache.evict();
    assert_eq!(cache.get(&"short_side"), Ok(&2));
    assert_eq!(cache.get(&"long_side"), Ok(&3));

    // One subtree expires; the survivor must stay reachable and evictable
    clock.advance(20); // now 31
    cache.evict();
    assert_eq!(cache.get(&"short_side"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"long_side"), Ok(&3));

    // The pivot node left the tree during that pass, taking its stranded
    // key with it.
    assert_eq!(cache.get(&"pivot"), Err(CacheError::KeyMissing));

    cache.evict();
    assert_eq!(cache.get(&"long_side"), Err(CacheError::KeyMissing));
    assert!(cache.is_empty());
}

// ============================================================================
// EVICTION ORDER OVER MANY ENTRIES
// ============================================================================

#[test]
fn test_priority_eviction_order_is_deterministic() {
    let (mut cache, _clock) = make_cache(1_000_000, 0);
    let keys: Vec<&'static str> = vec![
        "k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7", "k8", "k9", "k10", "k11",
    ];
    for (i, &key) in keys.iter().enumerate() {
        set_with(&mut cache, key, i as u32, Some((i % 3) as i64), None);
    }

    // Evictions must drain priority 2, then 1, then 0, each in insertion
    // order (all entries share one tick, so LRU degenerates to queue
    // order within a node).
    let mut evicted = Vec::new();
    while !cache.is_empty() {
        let before: Vec<&'static str> = cache.keys().copied().collect();
        cache.evict();
        for key in before {
            if !cache.contains_key(&key) {
                evicted.push(key);
            }
        }
    }

    let expected: Vec<&'static str> = vec![
        "k2", "k5", "k8", "k11", // priority 2
        "k1", "k4", "k7", "k10", // priority 1
        "k0", "k3", "k6", "k9", // priority 0
    ];
    assert_eq!(evicted, expected);
}

#[test]
fn test_evict_drains_cache_completely() {
    let (mut cache, clock) = make_cache(50, 0);
    for (i, key) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
        set_with(
            &mut cache,
            key,
            i as u32,
            Some((i % 2) as i64),
            Some(10 + 10 * i as u64),
        );
        clock.advance(1);
    }

    let mut passes = 0;
    while !cache.is_empty() {
        cache.evict();
        passes += 1;
        assert!(passes <= 16, "eviction failed to make progress");
    }
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.keys().count(), 0);
}

// ============================================================================
// INSERTION CONTEXT
// ============================================================================

#[test]
fn test_context_overrides_apply_only_inside_scope() {
    let (mut cache, clock) = make_cache(100, 0);
    {
        let mut scoped = cache.context(None, NonZeroU64::new(5));
        scoped.set("short", 1);
    }
    cache.set("normal", 2);
    clock.advance(50);

    cache.evict();

    assert_eq!(cache.get(&"short"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"normal"), Ok(&2));
}

#[test]
fn test_overwrite_adopts_current_context() {
    let (mut cache, _clock) = make_cache(1_000, 0);
    cache.set("a", 1);
    cache.set("b", 2);
    set_with(&mut cache, "a", 10, Some(9), None);

    // "a" was re-placed at priority 9 and is now the eviction victim
    cache.evict();
    assert_eq!(cache.get(&"a"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"b"), Ok(&2));
}

#[test]
fn test_context_restored_after_panic_unwind() {
    let (mut cache, _clock) = make_cache(1_000, 0);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut scoped = cache.context(Some(9), None);
        scoped.set("before_panic", 1);
        panic!("boom");
    }));
    assert!(result.is_err());

    // The context guard unwound; defaults are back in force
    cache.set("after_panic", 2);
    cache.evict();
    assert_eq!(cache.get(&"before_panic"), Err(CacheError::KeyMissing));
    assert_eq!(cache.get(&"after_panic"), Ok(&2));
}

// ============================================================================
// EVICT EDGE CASES
// ============================================================================

#[test]
fn test_evict_on_empty_cache_is_noop() {
    let (mut cache, _clock) = make_cache(100, 0);
    cache.evict();
    cache.evict();
    assert!(cache.is_empty());
}

#[test]
fn test_evict_after_everything_expired_then_again() {
    let (mut cache, clock) = make_cache(5, 0);
    cache.set("a", 1);
    clock.advance(10);

    cache.evict();
    assert!(cache.is_empty());

    // Nothing left: both the expiry sweep and the priority search are
    // no-ops
    cache.evict();
    assert!(cache.is_empty());
}

#[test]
fn test_metrics_distinguish_eviction_reasons() {
    let (mut cache, clock) = make_cache(5, 0);
    cache.set("expiring", 1);
    set_with(&mut cache, "low", 2, Some(9), Some(1_000));
    clock.advance(10);

    cache.evict(); // expiry sweep
    cache.evict(); // priority eviction

    let metrics = cache.metrics();
    assert_eq!(metrics.expired_evictions, 1);
    assert_eq!(metrics.priority_evictions, 1);
}
