use std::cmp::Ordering;

use fg_value::{CowHandle, Frame};
use slotmap::new_key_type;

use crate::error::EngineError;
use crate::filter::FrameData;
use crate::substrate::SubstrateId;

new_key_type! {
    /// Arena key for a scheduled `(substrate, frame_idx)` node.
    pub struct InstanceKey;
}

/// The user-facing delivery hook for a top-level `get_frame` request.
/// Invoked at most once, with exactly one of `(frame, None)` or `(None,
/// error)` (I5).
pub type Callback = Box<dyn FnOnce(Option<CowHandle<Frame>>, Option<EngineError>) + Send>;

/// A scheduler-owned node keyed by `(substrate, frame_idx)` (§3).
pub struct FrameInstance {
    pub substrate: SubstrateId,
    pub idx: u32,
    pub frame_data: FrameData,
    pub tick: u64,
    pub inputs: Vec<InstanceKey>,
    /// How many of `inputs`' leading entries are real filter dependencies
    /// (in `frame_data.dependencies` order) as opposed to the trailing
    /// `MAKE_LINEAR` false-dependency edge. `process_frame` only ever sees
    /// `inputs[..real_dep_count]` — the false dep exists purely to gate
    /// readiness, never to hand the filter a frame it didn't ask for.
    pub real_dep_count: usize,
    pub outputs: Vec<InstanceKey>,
    pub product: Option<CowHandle<Frame>>,
    pub callback: Option<Callback>,
    /// Worker de-dup: set by the worker that successfully claims this
    /// instance, guarded by the same lock as the rest of the scheduler
    /// state (see `scheduler_state.rs` for why this isn't a bare
    /// `AtomicBool` as in the original).
    pub taken: bool,
    pub false_dep: bool,
    pub single_threaded: bool,
    pub indulgence: u32,
}

impl FrameInstance {
    pub fn new(substrate: SubstrateId, idx: u32, frame_data: FrameData, tick: u64) -> Self {
        Self {
            substrate,
            idx,
            frame_data,
            tick,
            inputs: Vec::new(),
            real_dep_count: 0,
            outputs: Vec::new(),
            product: None,
            callback: None,
            taken: false,
            false_dep: false,
            single_threaded: false,
            indulgence: 0,
        }
    }

    pub fn is_ready(&self, instances: &slotmap::SlotMap<InstanceKey, FrameInstance>) -> bool {
        self.inputs
            .iter()
            .all(|k| instances.get(*k).is_some_and(|i| i.product.is_some()))
    }
}

/// A work-queue entry ordered so the *smallest* `tick` sorts greatest,
/// making [`fg_queue::PriorityQueue`] (a max-heap) dispatch
/// earliest-created instances first (§5: "ascending tick preferred").
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct WorkItem {
    pub tick: u64,
    pub key: InstanceKey,
}

impl Ord for WorkItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.tick.cmp(&self.tick)
    }
}

impl PartialOrd for WorkItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
