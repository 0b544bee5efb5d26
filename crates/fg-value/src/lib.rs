//! The value model: refcounted copy-on-write byte buffers, numeric arrays,
//! ordered property tables, and video frames built on top of them.
//!
//! None of these types know anything about the scheduler — they're the
//! immutable-until-unique data that flows through it.

mod bytes;
mod frame;
mod handle;
mod numeric;
mod table;

pub use bytes::{AlignedBytes, AllocStat, ALLOC_STAT, PLANE_ALIGNMENT};
pub use frame::{
    get_plane_mut, ColorFamily, Frame, FrameFormat, FrameInfo, FrameSampleType, FpsFraction,
    VideoInfo,
};
pub use handle::CowHandle;
pub use numeric::{NumericArray, SampleType};
pub use table::{Table, TableError, Value, NPOS};
