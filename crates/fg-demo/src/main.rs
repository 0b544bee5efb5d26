use std::sync::mpsc;

use fg_core::{
    AlignedBytes, ColorFamily, CowHandle, Engine, EngineConfig, EngineError, Filter, FilterFlags,
    Frame, FrameData, FrameFormat, FrameInfo, FrameSampleType, FpsFraction, FrameSource,
    SubstrateId, VideoInfo,
};

const WIDTH: usize = 4;
const HEIGHT: usize = 4;
const FRAME_COUNT: u32 = 8;

fn gray_info() -> FrameInfo {
    FrameInfo {
        format: FrameFormat::new(ColorFamily::Gray, FrameSampleType::Integer, 8, 0, 0),
        width: WIDTH,
        height: HEIGHT,
    }
}

fn video_info() -> VideoInfo {
    VideoInfo {
        frame_info: gray_info(),
        fps: FpsFraction { num: 24, den: 1 },
        frame_count: FRAME_COUNT,
    }
}

fn frame_filled_with(value: u8) -> Frame {
    let info = gray_info();
    let mut frame = Frame::new(info);
    let stride = frame.stride(0);
    let height = info.format.plane_height(info.height, 0);
    let mut plane = AlignedBytes::new(stride * height);
    plane.as_mut_slice().fill(value);
    frame.set_plane(0, plane);
    frame
}

/// Produces frame `k` filled with the byte value `k`. No dependencies.
struct SourceFilter;

impl Filter for SourceFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info()
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData { dependencies: vec![], idx })
    }

    fn process_frame(&mut self, _inputs: &[CowHandle<Frame>], frame_data: &FrameData) -> Result<Frame, EngineError> {
        Ok(frame_filled_with(frame_data.idx as u8))
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(SourceFilter)
    }
}

/// Doubles every byte of its single upstream dependency.
struct BrightenFilter {
    upstream: SubstrateId,
}

impl Filter for BrightenFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::NORMAL
    }

    fn video_info(&self) -> VideoInfo {
        video_info()
    }

    fn frame_data(&self, idx: u32) -> Result<FrameData, EngineError> {
        Ok(FrameData {
            dependencies: vec![FrameSource {
                substrate: self.upstream,
                frame_idx: idx,
            }],
            idx,
        })
    }

    fn process_frame(&mut self, inputs: &[CowHandle<Frame>], _frame_data: &FrameData) -> Result<Frame, EngineError> {
        let info = gray_info();
        let mut out = Frame::new(info);
        let stride = out.stride(0);
        let height = info.format.plane_height(info.height, 0);
        let mut plane = AlignedBytes::new(stride * height);
        for (dst, &src) in plane.as_mut_slice().iter_mut().zip(inputs[0].get_plane(0)) {
            *dst = src.saturating_mul(2);
        }
        out.set_plane(0, plane);
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(BrightenFilter {
            upstream: self.upstream,
        })
    }
}

fn main() {
    println!("Frame Graph Engine Demo");
    println!("========================\n");

    let engine = Engine::new(EngineConfig::default());
    let source = engine.register_filter(Box::new(SourceFilter));
    let brighten = engine.register_filter(Box::new(BrightenFilter { upstream: source }));
    let output = engine.create_output(brighten);
    engine.react();

    println!("Requesting {FRAME_COUNT} frames from a two-stage pipeline (source -> brighten)...\n");

    let (tx, rx) = mpsc::channel();
    for idx in 0..FRAME_COUNT {
        let tx = tx.clone();
        output.get_frame(idx, move |frame, error| {
            tx.send((idx, frame, error)).unwrap();
        });
    }
    drop(tx);

    let mut results: Vec<_> = rx.into_iter().collect();
    results.sort_by_key(|(idx, _, _)| *idx);

    for (idx, frame, error) in results {
        match (frame, error) {
            (Some(frame), None) => {
                println!("frame {idx}: byte0 = {}", frame.get_plane(0)[0]);
            }
            (None, Some(err)) => {
                println!("frame {idx}: failed: {err}");
            }
            _ => unreachable!("a frame callback always carries exactly one of frame/error"),
        }
    }

    engine.shutdown();
    println!("\nDone.");
}
