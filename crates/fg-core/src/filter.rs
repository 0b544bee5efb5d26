use bitflags::bitflags;
use fg_value::{CowHandle, Frame, VideoInfo};

use crate::error::EngineError;
use crate::substrate::SubstrateId;

bitflags! {
    /// Per-filter behavior flags (§6): `normal | MAKE_LINEAR(=4) |
    /// SINGLE_THREADED(=8)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterFlags: u32 {
        const NORMAL = 0;
        /// Frame `k` of this substrate may only run once frame `k-1` has
        /// completed (a synthetic dependency the maintainer wires in).
        const MAKE_LINEAR = 4;
        /// At most one instance of this substrate may be Running at a time.
        const SINGLE_THREADED = 8;
    }
}

/// Identifies an upstream frame a filter depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSource {
    pub substrate: SubstrateId,
    pub frame_idx: u32,
}

/// What a filter needs in order to produce one output frame.
///
/// Carries `idx` alongside the dependency list (a small supplement beyond
/// the original's bare `{dependencies, dependency_count}`): the original
/// engine lets each filter downcast `FrameData` to its own subclass and
/// stash whatever it needs there, commonly including the frame index
/// itself; since Rust has no equivalent downcast-to-subclass escape hatch
/// here, `idx` is promoted to a first-class field so `process_frame` can
/// always recover which output frame it's producing.
#[derive(Debug, Clone, Default)]
pub struct FrameData {
    pub dependencies: Vec<FrameSource>,
    pub idx: u32,
}

/// The host-implemented contract every registered filter satisfies (§6).
///
/// `process_frame` takes `&mut self` because each worker thread operates on
/// its own clone (see [`crate::substrate::Substrate`]) — exclusive access
/// within a thread is free, and `SINGLE_THREADED` filters additionally get
/// cross-thread exclusivity from the maintainer's neck queue.
pub trait Filter: Send {
    fn flags(&self) -> FilterFlags;

    fn video_info(&self) -> VideoInfo;

    /// Must be idempotent: called once per new instance, and the maintainer
    /// may call it again if a recomputation is needed after eviction. An
    /// error here is a construction failure (§7): it fails only the
    /// top-level request that triggered it, not sibling requests.
    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError>;

    fn process_frame(
        &mut self,
        inputs: &[CowHandle<Frame>],
        frame_data: &FrameData,
    ) -> Result<Frame, EngineError>;

    /// Called when the owning instance is torn down. Default no-op; most
    /// filters don't hold resources tied to a specific `FrameData`.
    fn drop_frame_data(&mut self, _frame_data: FrameData) {}

    /// Produce an independently usable clone for another worker thread.
    fn clone_box(&self) -> Box<dyn Filter>;
}
