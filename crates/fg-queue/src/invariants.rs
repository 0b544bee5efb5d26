//! Debug assertion macros for queue invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`) — zero overhead
//! in release builds. Mirrors the `INV-*` convention used throughout this
//! workspace's queue primitives.

// =============================================================================
// INV-SCQ-01: Tail Never Outruns Head
// =============================================================================

/// Assert that the consumer never advances past a node it hasn't linked to.
///
/// **Invariant**: a popped node's successor must be non-null before `tail`
/// is advanced onto it.
///
/// Used in: `ScQueue::pop`
macro_rules! debug_assert_has_successor {
    ($next:expr) => {
        debug_assert!(
            !$next.is_null(),
            "INV-SCQ-01 violated: advancing tail onto a null successor"
        )
    };
}

// =============================================================================
// INV-PQ-01: Heap Pop Is Non-Decreasing In Priority Key
// =============================================================================

/// Assert that consecutive pops never regress in priority ordering.
///
/// **Invariant**: for a min-heap ordered on `tick`, `pop()` never yields a
/// `tick` smaller than the previous pop's `tick`.
///
/// Used in: property tests only (the heap itself doesn't track "previous
/// pop", so this is asserted by the caller, not inline in `pop`).
macro_rules! debug_assert_priority_non_decreasing {
    ($prev:expr, $cur:expr) => {
        debug_assert!(
            $cur >= $prev,
            "INV-PQ-01 violated: priority regressed from {} to {}",
            $prev,
            $cur
        )
    };
}

// =============================================================================
// INV-PQ-02: Stop Is Terminal
// =============================================================================

/// Assert that once a queue observes `request_stop`, it never un-stops.
macro_rules! debug_assert_stop_monotonic {
    ($was_stopped:expr, $is_stopped:expr) => {
        debug_assert!(
            !$was_stopped || $is_stopped,
            "INV-PQ-02 violated: stop flag cleared after being set"
        )
    };
}

pub(crate) use debug_assert_has_successor;
#[allow(unused_imports)]
pub(crate) use debug_assert_priority_non_decreasing;
pub(crate) use debug_assert_stop_monotonic;
