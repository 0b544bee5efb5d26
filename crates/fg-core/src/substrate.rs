use std::collections::HashMap;
use std::sync::Mutex;

use fg_value::VideoInfo;
use slotmap::new_key_type;

use crate::filter::{Filter, FilterFlags, FrameData};

new_key_type! {
    /// Arena key for a registered filter's graph vertex.
    pub struct SubstrateId;
}

/// Sentinel worker slot holding the canonical, never-executed filter
/// instance — every per-worker clone is stamped out from this one (§4.E).
pub const POSITION_ZERO: usize = usize::MAX;

/// A registered filter pinned to a graph vertex, plus a per-worker clone
/// table.
///
/// The clone table is `Mutex`-guarded rather than left to the original's
/// "only the maintainer writes, workers only read after a happens-before
/// edge" discipline: that discipline is real (population completes before
/// the instance is ever posted to the work queue) but isn't something the
/// borrow checker can see through a `HashMap` keyed by worker id, so a
/// short-held lock buys safety at a cost amortized to zero after the first
/// construct of each substrate.
pub struct Substrate {
    filters: Mutex<HashMap<usize, Box<dyn Filter>>>,
    video_info: VideoInfo,
}

impl Substrate {
    pub fn new(filter: Box<dyn Filter>) -> Self {
        let video_info = filter.video_info();
        let mut filters = HashMap::new();
        filters.insert(POSITION_ZERO, filter);
        Self {
            filters: Mutex::new(filters),
            video_info,
        }
    }

    pub fn video_info(&self) -> VideoInfo {
        self.video_info
    }

    pub fn filter_flags(&self) -> FilterFlags {
        self.filters.lock().unwrap()[&POSITION_ZERO].flags()
    }

    pub fn frame_data(&self, idx: u32) -> Result<FrameData, crate::error::EngineError> {
        self.filters.lock().unwrap()[&POSITION_ZERO].frame_data(idx)
    }

    /// Stamp out a clone for every worker id in `0..worker_count` that
    /// doesn't already have one. A no-op for worker ids already populated —
    /// called on every `construct()`, so a shutdown/`set_config`/`react()`
    /// cycle that raises `thread_count` tops up the missing clones instead
    /// of leaving them unpopulated (§6: "`set_config` changes apply on the
    /// next thread-pool start").
    pub fn ensure_worker_clones(&self, worker_count: usize) {
        let mut filters = self.filters.lock().unwrap();
        let promoter = filters[&POSITION_ZERO].clone_box();
        for worker_id in 0..worker_count {
            filters.entry(worker_id).or_insert_with(|| promoter.clone_box());
        }
    }

    pub fn process_frame(
        &self,
        worker_id: usize,
        inputs: &[fg_value::CowHandle<fg_value::Frame>],
        frame_data: &FrameData,
    ) -> Result<fg_value::Frame, crate::error::EngineError> {
        let mut filters = self.filters.lock().unwrap();
        let filter = filters
            .get_mut(&worker_id)
            .expect("worker clone must be populated before dispatch");
        filter.process_frame(inputs, frame_data)
    }

    pub fn drop_frame_data(&self, frame_data: FrameData) {
        let mut filters = self.filters.lock().unwrap();
        for filter in filters.values_mut() {
            filter.drop_frame_data(frame_data.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_value::{ColorFamily, Frame, FrameFormat, FrameInfo, FrameSampleType, FpsFraction};

    struct IdentityFilter;

    impl Filter for IdentityFilter {
        fn flags(&self) -> FilterFlags {
            FilterFlags::NORMAL
        }

        fn video_info(&self) -> VideoInfo {
            VideoInfo {
                frame_info: FrameInfo {
                    format: FrameFormat::new(ColorFamily::Gray, FrameSampleType::Integer, 8, 0, 0),
                    width: 2,
                    height: 2,
                },
                fps: FpsFraction { num: 30, den: 1 },
                frame_count: 3,
            }
        }

        fn frame_data(&self, _idx: u32) -> Result<FrameData, crate::error::EngineError> {
            Ok(FrameData::default())
        }

        fn process_frame(
            &mut self,
            _inputs: &[fg_value::CowHandle<Frame>],
            _frame_data: &FrameData,
        ) -> Result<Frame, crate::error::EngineError> {
            Ok(Frame::new(self.video_info().frame_info))
        }

        fn clone_box(&self) -> Box<dyn Filter> {
            Box::new(IdentityFilter)
        }
    }

    #[test]
    fn test_ensure_worker_clones_populates_once() {
        let sub = Substrate::new(Box::new(IdentityFilter));
        sub.ensure_worker_clones(4);
        assert_eq!(sub.filters.lock().unwrap().len(), 5);
        sub.ensure_worker_clones(4);
        assert_eq!(sub.filters.lock().unwrap().len(), 5);
    }

    /// Guards against a shutdown/`set_config(thread_count: bigger)`/`react()`
    /// cycle leaving the new worker ids without a filter clone: a second
    /// call with a larger `worker_count` must top up the missing entries
    /// rather than treat the table as already populated.
    #[test]
    fn test_ensure_worker_clones_tops_up_on_growth() {
        let sub = Substrate::new(Box::new(IdentityFilter));
        sub.ensure_worker_clones(2);
        assert_eq!(sub.filters.lock().unwrap().len(), 3);
        sub.ensure_worker_clones(8);
        assert_eq!(sub.filters.lock().unwrap().len(), 9);
        for worker_id in 0..8 {
            assert!(sub.filters.lock().unwrap().contains_key(&worker_id));
        }
        // process_frame must not panic for any of the newly-grown ids.
        sub.process_frame(7, &[], &FrameData::default()).unwrap();
    }

    #[test]
    fn test_process_frame_uses_worker_clone() {
        let sub = Substrate::new(Box::new(IdentityFilter));
        sub.ensure_worker_clones(2);
        let frame = sub.process_frame(0, &[], &FrameData::default()).unwrap();
        assert_eq!(frame.num_planes(), 1);
    }
}
