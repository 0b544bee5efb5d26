//! End-to-end scheduler scenarios, adapted from the canonical S1-S6 test
//! matrix: identity production, chained dependencies, `MAKE_LINEAR`
//! ordering, `SINGLE_THREADED` exclusivity, and failure-cascade isolation.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fg_core::{
    ColorFamily, CowHandle, Engine, EngineConfig, EngineError, Filter, FilterFlags, Frame,
    FrameData, FrameFormat, FrameInfo, FrameSampleType, FpsFraction, VideoInfo,
};

fn gray2x2_info() -> FrameInfo {
    FrameInfo {
        format: FrameFormat::new(ColorFamily::Gray, FrameSampleType::Integer, 8, 0, 0),
        width: 2,
        height: 2,
    }
}

fn video_info(frame_count: u32) -> VideoInfo {
    VideoInfo {
        frame_info: gray2x2_info(),
        fps: FpsFraction { num: 30, den: 1 },
        frame_count,
    }
}

fn frame_with_byte0(value: u8) -> Frame {
    let info = gray2x2_info();
    let mut frame = Frame::new(info);
    let stride = frame.stride(0);
    let height = info.format.plane_height(info.height, 0);
    let mut plane = fg_value::AlignedBytes::new(stride * height);
    plane.as_mut_slice()[0] = value;
    frame.set_plane(0, plane);
    frame
}

/// S1: no-dependency filter producing frame k with byte0 = k+1.
struct IdentityFilter {
    frame_count: u32,
}

impl Filter for IdentityFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData { dependencies: vec![], idx })
    }

    fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
        Ok(frame_with_byte0((frame_data.idx + 1) as u8))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(IdentityFilter {
            frame_count: self.frame_count,
        })
    }
}

/// S2: depends on `upstream[k]`, doubles byte0.
struct DoublingFilter {
    upstream: fg_core::SubstrateId,
    frame_count: u32,
}

impl Filter for DoublingFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData {
            dependencies: vec![fg_core::FrameSource {
                substrate: self.upstream,
                frame_idx: idx,
            }],
            idx,
        })
    }

    fn process_frame(&mut self, inputs: &[CowHandle<Frame>], _frame_data: &FrameData) -> Result<Frame, EngineError> {
        let byte0 = inputs[0].get_plane(0)[0];
        Ok(frame_with_byte0(byte0.wrapping_mul(2)))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(DoublingFilter {
            upstream: self.upstream,
            frame_count: self.frame_count,
        })
    }
}

/// S3: MAKE_LINEAR filter with no real dependencies; the maintainer wires a
/// synthetic `idx -> idx-1` edge so frame `k` only runs after `k-1`'s notify.
struct LinearFilter {
    frame_count: u32,
    order: Arc<Mutex<Vec<u32>>>,
}

impl Filter for LinearFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::MAKE_LINEAR
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData { dependencies: vec![], idx })
    }

    fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
        self.order.lock().unwrap().push(frame_data.idx);
        std::thread::sleep(Duration::from_millis(2));
        Ok(frame_with_byte0(frame_data.idx as u8))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(LinearFilter {
            frame_count: self.frame_count,
            order: Arc::clone(&self.order),
        })
    }
}

/// S4: SINGLE_THREADED filter that sleeps to make concurrent-run
/// violations observable.
struct SleepyFilter {
    frame_count: u32,
    running: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
}

impl Filter for SleepyFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::SINGLE_THREADED
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData { dependencies: vec![], idx })
    }

    fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(frame_with_byte0(frame_data.idx as u8))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(SleepyFilter {
            frame_count: self.frame_count,
            running: Arc::clone(&self.running),
            max_concurrent: Arc::clone(&self.max_concurrent),
        })
    }
}

/// S5: fails deterministically on a single index.
struct FailsOnFilter {
    frame_count: u32,
    fail_idx: u32,
}

impl Filter for FailsOnFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData { dependencies: vec![], idx })
    }

    fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
        if frame_data.idx == self.fail_idx {
            return Err(EngineError::FilterFailed(format!("boom at {}", frame_data.idx)));
        }
        Ok(frame_with_byte0(frame_data.idx as u8))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(FailsOnFilter {
            frame_count: self.frame_count,
            fail_idx: self.fail_idx,
        })
    }
}

/// A filter that merely forwards its single dependency's frame untouched,
/// used to build the downstream half of the S5 failure-cascade scenario.
struct ForwardingFilter {
    upstream: fg_core::SubstrateId,
    frame_count: u32,
}

impl Filter for ForwardingFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info(self.frame_count)
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData {
            dependencies: vec![fg_core::FrameSource {
                substrate: self.upstream,
                frame_idx: idx,
            }],
            idx,
        })
    }

    fn process_frame(&mut self, inputs: &[CowHandle<Frame>], _frame_data: &FrameData) -> Result<Frame, EngineError> {
        Ok(frame_with_byte0(inputs[0].get_plane(0)[0]))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(ForwardingFilter {
            upstream: self.upstream,
            frame_count: self.frame_count,
        })
    }
}

#[test]
fn s1_identity_filter_produces_distinct_frames() {
    let engine = Engine::new(EngineConfig {
        thread_count: 4,
        mem_hint_mb: 0,
    });
    let substrate = engine.register_filter(Box::new(IdentityFilter { frame_count: 3 }));
    let output = engine.create_output(substrate);
    engine.react();

    let (tx, rx) = mpsc::channel();
    for idx in 0..3 {
        let tx = tx.clone();
        output.get_frame(idx, move |frame, error| {
            tx.send((idx, frame, error)).unwrap();
        });
    }
    drop(tx);

    let mut seen = std::collections::HashMap::new();
    for (idx, frame, error) in rx {
        assert!(error.is_none());
        let frame = frame.expect("expected a frame");
        seen.insert(idx, frame.get_plane(0)[0]);
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[&0], 1);
    assert_eq!(seen[&1], 2);
    assert_eq!(seen[&2], 3);
}

#[test]
fn s2_chained_dependency_doubles_byte() {
    let engine = Engine::new(EngineConfig::default());
    let a = engine.register_filter(Box::new(IdentityFilter { frame_count: 3 }));
    let b = engine.register_filter(Box::new(DoublingFilter {
        upstream: a,
        frame_count: 3,
    }));
    let output_b = engine.create_output(b);
    engine.react();

    let (tx, rx) = mpsc::channel();
    output_b.get_frame(0, move |frame, error| {
        tx.send((frame, error)).unwrap();
    });
    let (frame, error) = rx.recv().unwrap();
    assert!(error.is_none());
    assert_eq!(frame.unwrap().get_plane(0)[0], 2);
}

#[test]
fn s3_make_linear_runs_strictly_in_index_order() {
    let engine = Engine::new(EngineConfig {
        thread_count: 8,
        mem_hint_mb: 0,
    });
    let order = Arc::new(Mutex::new(Vec::new()));
    let substrate = engine.register_filter(Box::new(LinearFilter {
        frame_count: 5,
        order: Arc::clone(&order),
    }));
    let output = engine.create_output(substrate);
    engine.react();

    let (tx, rx) = mpsc::channel();
    // Requested in index order from one thread: the maintain queue's FIFO
    // ordering then guarantees the dependency on `idx-1` is wired by the
    // time `idx` is constructed.
    for idx in 0..5u32 {
        let tx = tx.clone();
        output.get_frame(idx, move |frame, error| {
            tx.send((idx, frame, error)).unwrap();
        });
    }
    drop(tx);
    for (idx, frame, error) in rx {
        assert!(error.is_none(), "idx {idx} should have succeeded");
        assert!(frame.is_some());
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn s4_single_threaded_filter_never_runs_concurrently() {
    let engine = Engine::new(EngineConfig {
        thread_count: 8,
        mem_hint_mb: 0,
    });
    let running = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let substrate = engine.register_filter(Box::new(SleepyFilter {
        frame_count: 20,
        running: Arc::clone(&running),
        max_concurrent: Arc::clone(&max_concurrent),
    }));
    let output = engine.create_output(substrate);
    engine.react();

    let (tx, rx) = mpsc::channel();
    for idx in 0..20 {
        let tx = tx.clone();
        output.get_frame(idx, move |frame, error| {
            tx.send((frame, error)).unwrap();
        });
    }
    drop(tx);
    for (frame, error) in rx {
        assert!(error.is_none());
        assert!(frame.is_some());
    }
    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
}

#[test]
fn s5_failure_cascade_isolates_independent_siblings() {
    let engine = Engine::new(EngineConfig::default());
    let f = engine.register_filter(Box::new(FailsOnFilter {
        frame_count: 10,
        fail_idx: 5,
    }));
    let e = engine.register_filter(Box::new(ForwardingFilter {
        upstream: f,
        frame_count: 10,
    }));
    let output_e = engine.create_output(e);
    engine.react();

    let (tx, rx) = mpsc::channel();
    for idx in [3u32, 4, 5, 6, 7] {
        let tx = tx.clone();
        output_e.get_frame(idx, move |frame, error| {
            tx.send((idx, frame, error)).unwrap();
        });
    }
    drop(tx);

    let mut results = std::collections::HashMap::new();
    for (idx, frame, error) in rx {
        results.insert(idx, (frame, error));
    }
    assert_eq!(results.len(), 5);
    for idx in [3u32, 4, 6, 7] {
        let (frame, error) = &results[&idx];
        assert!(error.is_none(), "idx {idx} should have succeeded");
        assert!(frame.is_some());
    }
    let (frame5, error5) = &results[&5];
    assert!(frame5.is_none());
    assert!(error5.is_some());
}

#[test]
fn s6_shutdown_joins_all_threads_promptly() {
    let engine = Engine::new(EngineConfig {
        thread_count: 4,
        mem_hint_mb: 0,
    });
    let substrate = engine.register_filter(Box::new(IdentityFilter { frame_count: 1000 }));
    let output = engine.create_output(substrate);
    engine.react();

    let received = Arc::new(AtomicU32::new(0));
    for idx in 0..1000 {
        let received = Arc::clone(&received);
        output.get_frame(idx, move |_frame, _error| {
            received.fetch_add(1, Ordering::SeqCst);
        });
    }

    let start = Instant::now();
    drop(engine);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn i5_callback_invoked_exactly_once() {
    let engine = Engine::new(EngineConfig::default());
    let substrate = engine.register_filter(Box::new(IdentityFilter { frame_count: 1 }));
    let output = engine.create_output(substrate);
    engine.react();

    let count = Arc::new(Mutex::new(0));
    let count2 = Arc::clone(&count);
    let (tx, rx) = mpsc::channel();
    output.get_frame(0, move |frame, error| {
        *count2.lock().unwrap() += 1;
        tx.send((frame, error)).unwrap();
    });
    rx.recv().unwrap();
    // Give any errant double-invocation a chance to land before checking.
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(*count.lock().unwrap(), 1);
}

/// I6: callbacks posted by the same `Output` are delivered in submission
/// order, even though the underlying frames may finish out of order
/// (index 0 is made the slowest so an ordering bug would surface as 0
/// arriving last instead of first).
#[test]
fn i6_single_output_delivers_in_submission_order() {
    struct VariableDelayFilter {
        frame_count: u32,
    }

    impl Filter for VariableDelayFilter {
        fn flags(&self) -> FilterFlags {
            FilterFlags::NORMAL
        }

        fn video_info(&self) -> VideoInfo {
            video_info(self.frame_count)
        }

        fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
            Ok(FrameData { dependencies: vec![], idx })
        }

        fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
            // The earliest-submitted index sleeps longest, so it's the last
            // to finish; submission order must still win on delivery.
            let delay_ms = 20u64.saturating_sub(u64::from(frame_data.idx) * 5);
            std::thread::sleep(Duration::from_millis(delay_ms));
            Ok(frame_with_byte0(frame_data.idx as u8))
        }

        fn clone_box(&self) -> Box<dyn Filter> {
            Box::new(VariableDelayFilter {
                frame_count: self.frame_count,
            })
        }
    }

    let engine = Engine::new(EngineConfig {
        thread_count: 4,
        mem_hint_mb: 0,
    });
    let substrate = engine.register_filter(Box::new(VariableDelayFilter { frame_count: 4 }));
    let output = engine.create_output(substrate);
    engine.react();

    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();
    for idx in 0..4u32 {
        let tx = tx.clone();
        let order = Arc::clone(&order);
        output.get_frame(idx, move |frame, error| {
            assert!(error.is_none());
            assert!(frame.is_some());
            order.lock().unwrap().push(idx);
            tx.send(()).unwrap();
        });
    }
    drop(tx);
    for _ in rx {}

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

/// I7: after engine destruction, no plane buffer remains live.
#[test]
fn i7_no_leaks_after_shutdown() {
    let before = fg_value::ALLOC_STAT.get_current();
    {
        let engine = Engine::new(EngineConfig {
            thread_count: 4,
            mem_hint_mb: 0,
        });
        let a = engine.register_filter(Box::new(IdentityFilter { frame_count: 50 }));
        let b = engine.register_filter(Box::new(DoublingFilter {
            upstream: a,
            frame_count: 50,
        }));
        let output = engine.create_output(b);
        engine.react();

        let (tx, rx) = mpsc::channel();
        for idx in 0..50u32 {
            let tx = tx.clone();
            output.get_frame(idx, move |frame, error| {
                tx.send((frame, error)).unwrap();
            });
        }
        drop(tx);
        for (_frame, error) in rx {
            assert!(error.is_none());
        }
        engine.shutdown();
    }
    assert_eq!(fg_value::ALLOC_STAT.get_current(), before);
}
