use crate::bytes::AlignedBytes;

/// Element interpretation of a [`NumericArray`]'s underlying bytes.
///
/// Mirrors the frame-format encoding's `sample_type:4` nibble (§6): a
/// numeric array carries the same tag so property values (e.g. a per-pixel
/// gain table) can be read back with the right element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Integer = 0,
    Float = 1,
}

/// A typed, length-in-bytes numeric array.
///
/// Plain `Vec<T>` doesn't fit here because the engine's tables store
/// numeric arrays as an untyped `(SampleType, bytes)` pair that arbitrary
/// host code produces and consumes across an ABI-shaped boundary — the
/// byte-oriented storage is the honest representation, with typed
/// accessors layered on top for in-process callers.
#[derive(Debug, Clone)]
pub struct NumericArray {
    sample_type: SampleType,
    bytes: AlignedBytes,
}

impl NumericArray {
    pub fn new(sample_type: SampleType, byte_len: usize) -> Self {
        Self {
            sample_type,
            bytes: AlignedBytes::new(byte_len),
        }
    }

    pub fn from_i32s(values: &[i32]) -> Self {
        let mut arr = Self::new(SampleType::Integer, values.len() * 4);
        for (chunk, v) in arr.bytes.as_mut_slice().chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&v.to_ne_bytes());
        }
        arr
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        let mut arr = Self::new(SampleType::Float, values.len() * 4);
        for (chunk, v) in arr.bytes.as_mut_slice().chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&v.to_ne_bytes());
        }
        arr
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn as_i32s(&self) -> Option<Vec<i32>> {
        if self.sample_type != SampleType::Integer {
            return None;
        }
        Some(
            self.bytes
                .as_slice()
                .chunks_exact(4)
                .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
                .collect(),
        )
    }

    pub fn as_f32s(&self) -> Option<Vec<f32>> {
        if self.sample_type != SampleType::Float {
            return None;
        }
        Some(
            self.bytes
                .as_slice()
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
                .collect(),
        )
    }
}
