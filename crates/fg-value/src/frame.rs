use crate::bytes::{AlignedBytes, PLANE_ALIGNMENT};
use crate::handle::CowHandle;
use crate::table::Table;

/// `ColorFamily ∈ {Gray=1, RGB=2, YUV=3}` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorFamily {
    Gray = 1,
    RGB = 2,
    YUV = 3,
}

impl ColorFamily {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => ColorFamily::Gray,
            2 => ColorFamily::RGB,
            3 => ColorFamily::YUV,
            other => panic!("invalid color family bits: {other}"),
        }
    }
}

/// `SampleType ∈ {Integer=0, Float=1}`, as carried by a frame format (not
/// to be confused with [`crate::numeric::SampleType`], the table-value
/// variant — the two happen to share a name in the original engine but
/// are encoded in unrelated bitfields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameSampleType {
    Integer = 0,
    Float = 1,
}

impl FrameSampleType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => FrameSampleType::Integer,
            1 => FrameSampleType::Float,
            other => panic!("invalid sample type bits: {other}"),
        }
    }
}

/// A 32-bit packed frame format descriptor (§6): `height_subsampling:8 |
/// width_subsampling:8 | bits_per_sample:8 | sample_type:4 |
/// color_family:4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat(u32);

impl FrameFormat {
    pub fn new(
        color_family: ColorFamily,
        sample_type: FrameSampleType,
        bits_per_sample: u8,
        width_subsampling: u8,
        height_subsampling: u8,
    ) -> Self {
        let bits = (height_subsampling as u32) << 24
            | (width_subsampling as u32) << 16
            | (bits_per_sample as u32) << 8
            | (sample_type as u32) << 4
            | (color_family as u32);
        Self(bits)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn color_family(&self) -> ColorFamily {
        ColorFamily::from_bits((self.0 & 0xF) as u8)
    }

    pub fn sample_type(&self) -> FrameSampleType {
        FrameSampleType::from_bits(((self.0 >> 4) & 0xF) as u8)
    }

    pub fn bits_per_sample(&self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub fn width_subsampling(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn height_subsampling(&self) -> u8 {
        ((self.0 >> 24) & 0xFF) as u8
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample() as usize).div_ceil(8)
    }

    /// Plane count: 1 if Gray else 3 (§6).
    pub fn num_planes(&self) -> usize {
        match self.color_family() {
            ColorFamily::Gray => 1,
            ColorFamily::RGB | ColorFamily::YUV => 3,
        }
    }

    pub fn plane_width(&self, frame_width: usize, plane: usize) -> usize {
        if plane == 0 || self.color_family() == ColorFamily::RGB {
            frame_width
        } else {
            frame_width >> self.width_subsampling()
        }
    }

    pub fn plane_height(&self, frame_height: usize, plane: usize) -> usize {
        if plane == 0 || self.color_family() == ColorFamily::RGB {
            frame_height
        } else {
            frame_height >> self.height_subsampling()
        }
    }

    pub fn width_bytes(&self, frame_width: usize, plane: usize) -> usize {
        self.plane_width(frame_width, plane) * self.bytes_per_sample()
    }

    /// Stride rounded up to the plane alignment (§6: `ceil(width_bytes /
    /// 64) * 64`).
    pub fn default_stride(&self, frame_width: usize, plane: usize) -> usize {
        let wb = self.width_bytes(frame_width, plane);
        wb.div_ceil(PLANE_ALIGNMENT) * PLANE_ALIGNMENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub format: FrameFormat,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsFraction {
    pub num: u32,
    pub den: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub frame_info: FrameInfo,
    pub fps: FpsFraction,
    pub frame_count: u32,
}

/// An immutable-until-unique video frame: up to three cache-line-aligned
/// planes, their strides, and a property table.
///
/// Mutation goes through [`CowHandle::make_mut`] at the plane-vector /
/// table granularity rather than per-plane, since the original engine's
/// `get_plane_mut` usurps the whole `Frame` object (the planes array lives
/// inside it), not an individually-refcounted plane.
#[derive(Debug, Clone)]
pub struct Frame {
    info: FrameInfo,
    planes: Vec<AlignedBytes>,
    strides: Vec<usize>,
    props: Table,
}

impl Frame {
    /// Allocate a blank frame with zeroed, correctly-strided planes.
    pub fn new(info: FrameInfo) -> Self {
        let num_planes = info.format.num_planes();
        let mut planes = Vec::with_capacity(num_planes);
        let mut strides = Vec::with_capacity(num_planes);
        for plane in 0..num_planes {
            let stride = info.format.default_stride(info.width, plane);
            let height = info.format.plane_height(info.height, plane);
            planes.push(AlignedBytes::new(stride * height));
            strides.push(stride);
        }
        Self {
            info,
            planes,
            strides,
            props: Table::new(),
        }
    }

    pub fn frame_info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn get_plane(&self, plane: usize) -> &[u8] {
        self.planes[plane].as_slice()
    }

    pub fn stride(&self, plane: usize) -> usize {
        self.strides[plane]
    }

    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn get_frame_props(&self) -> &Table {
        &self.props
    }

    pub fn get_frame_props_mut(&mut self) -> &mut Table {
        &mut self.props
    }

    pub fn set_plane(&mut self, plane: usize, data: AlignedBytes) {
        self.planes[plane] = data;
    }
}

/// `get_plane_mut` on a possibly-shared handle: usurp if unique, else clone
/// the whole frame first. Lives as a free function (rather than a method
/// on `Frame`) because the usurp-or-clone decision is about the *handle*,
/// not the frame value itself.
pub fn get_plane_mut(handle: &mut CowHandle<Frame>, plane: usize) -> &mut [u8] {
    handle.make_mut().planes[plane].as_mut_slice()
}
