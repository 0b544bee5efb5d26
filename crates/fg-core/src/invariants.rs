//! Debug assertion macros for the scheduler invariants documented in
//! spec §8 (I1-I4). Only active in debug builds (`#[cfg(debug_assertions)]`),
//! so there is zero overhead in release builds.
//!
//! Mirrors `crates/ringmpsc/src/invariants.rs`'s `INV-*` convention, one
//! macro per invariant, each citing the call site it guards.

// =============================================================================
// I1: Uniqueness — at most one live FrameInstance per (substrate, idx)
// =============================================================================

/// Assert that `construct()` never re-inserts a key already present in
/// `SchedulerState::index`.
///
/// **Invariant**: for all live instances I, J with I != J, `(I.substrate,
/// I.idx) != (J.substrate, J.idx)`.
///
/// Used in: `maintainer::construct()`, right before `state.index.insert`.
macro_rules! debug_assert_i1_unique_instance {
    ($already_indexed:expr) => {
        debug_assert!(
            !$already_indexed,
            "I1 violated: inserting a second FrameInstance for an already-indexed (substrate, idx) key"
        )
    };
}

// =============================================================================
// I2: At-most-once execution — process_frame runs 0 or 1 times per instance
// =============================================================================

/// Assert that a worker only flips `taken` from `false` to `true`, never
/// observes it already `true` right before claiming.
///
/// **Invariant**: for every instance I, `process_frame` is invoked exactly
/// 0 or 1 times across all workers.
///
/// Used in: `worker::run_one()`, right before `inst.taken = true`.
macro_rules! debug_assert_i2_not_already_taken {
    ($taken:expr) => {
        debug_assert!(
            !$taken,
            "I2 violated: claiming an instance whose `taken` flag is already set"
        )
    };
}

// =============================================================================
// I3: Input readiness — inputs[k].product is Some before a worker reads it
// =============================================================================

/// Assert that every input gathered for `process_frame` has a product.
///
/// **Invariant**: when a worker reads `inputs[k].product`, it is `Some`.
///
/// Used in: `worker::run_one()`, after gathering input frames.
macro_rules! debug_assert_i3_inputs_ready {
    ($gathered:expr, $expected:expr) => {
        debug_assert_eq!(
            $gathered, $expected,
            "I3 violated: gathered fewer input products ({}) than real dependencies ({}) before dispatch",
            $gathered, $expected
        )
    };
}

// =============================================================================
// I4: At-most-one Running instance per SINGLE_THREADED substrate
// =============================================================================

/// Assert that posting a single-threaded substrate's queued instance to work
/// never happens while its neck is already marked busy.
///
/// **Invariant**: if `flags & SINGLE_THREADED`, at most one instance of that
/// substrate is in Running at any time.
///
/// Used in: `maintainer::drain_neck()`, right before marking `busy = true`.
macro_rules! debug_assert_i4_neck_exclusive {
    ($busy:expr) => {
        debug_assert!(
            !$busy,
            "I4 violated: posting a single-threaded substrate's instance while its neck is already busy"
        )
    };
}

pub(crate) use debug_assert_i1_unique_instance;
pub(crate) use debug_assert_i2_not_already_taken;
pub(crate) use debug_assert_i3_inputs_ready;
pub(crate) use debug_assert_i4_neck_exclusive;
