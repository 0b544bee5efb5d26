use std::collections::{HashMap, HashSet, VecDeque};

use slotmap::SlotMap;

use crate::instance::{FrameInstance, InstanceKey};
use crate::substrate::SubstrateId;

/// Single-threaded-filter backpressure bookkeeping (§4.G "Posting work").
#[derive(Default)]
pub struct NeckState {
    pub busy: bool,
    pub queued: VecDeque<InstanceKey>,
}

/// The maintainer's private state (§4.G), arena-backed per the "raw
/// pointer graphs" redesign flag: `FrameInstance`s live in a `SlotMap` and
/// reference each other by key instead of by pointer, so the kill-tree and
/// GC passes can never dangle or double-free.
///
/// Bundled into one struct behind one lock (see `maintainer.rs`) rather
/// than the original's disjoint single-writer collections: workers need to
/// write `product`/`taken` on an individual instance, which Rust cannot
/// let happen through a shared reference without some synchronization
/// the compiler can verify, and one short-held mutex around the whole
/// graph is the simplest such mechanism that stays faithful to "maintainer
/// bookkeeping is single-writer, worker writes exactly one field."
#[derive(Default)]
pub struct SchedulerState {
    pub arena: SlotMap<InstanceKey, FrameInstance>,
    pub index: HashMap<(SubstrateId, u32), InstanceKey>,
    pub alive: HashSet<InstanceKey>,
    pub neck: HashMap<SubstrateId, NeckState>,
    pub history: HashSet<(SubstrateId, u32)>,
    pub miss: HashMap<SubstrateId, u32>,
    pub tick: u64,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_tick(&mut self) -> u64 {
        let t = self.tick;
        self.tick += 1;
        t
    }
}
