//! The reactive frame-graph scheduler: registers filters as substrates,
//! expands `get_frame` requests into a dependency graph of `FrameInstance`s,
//! and drives their execution across a maintainer / worker-pool /
//! callback-dispatcher thread arrangement.

mod callback;
mod engine;
mod error;
mod filter;
mod instance;
mod invariants;
mod logger;
mod maintainer;
mod output;
mod scheduler_state;
mod substrate;
mod worker;

pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use filter::{Filter, FilterFlags, FrameData, FrameSource};
pub use logger::{LogLevel, LogSink, Logger, StderrSink};
pub use output::Output;
pub use substrate::SubstrateId;

pub use fg_value::{
    get_plane_mut, AlignedBytes, ColorFamily, CowHandle, Frame, FrameFormat, FrameInfo,
    FrameSampleType, FpsFraction, VideoInfo,
};
