use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

/// Cache-line alignment used for plane buffers (§4.D / §6 "plane alignment
/// = 64 bytes").
pub const PLANE_ALIGNMENT: usize = 64;

/// Tracks live byte-buffer allocations made through [`AlignedBytes`].
///
/// Grounds `Nucleus::AllocStat` in the original engine: a pair of relaxed
/// atomic counters, useful for diagnosing leaks at shutdown (I7) without
/// imposing any ordering requirement on the hot path.
pub struct AllocStat {
    current_bytes: AtomicI64,
}

impl AllocStat {
    pub const fn new() -> Self {
        Self {
            current_bytes: AtomicI64::new(0),
        }
    }

    fn record_alloc(&self, len: usize) {
        self.current_bytes.fetch_add(len as i64, Ordering::Relaxed);
    }

    fn record_free(&self, len: usize) {
        self.current_bytes.fetch_sub(len as i64, Ordering::Relaxed);
    }

    pub fn get_current(&self) -> i64 {
        self.current_bytes.load(Ordering::Relaxed)
    }
}

impl Default for AllocStat {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide plane-buffer accounting, consulted by tests asserting I7
/// (no leaks after shutdown). Cache-padded: every plane alloc/free touches
/// this counter, and it would otherwise share a line with whatever the
/// allocator places next to it.
pub static ALLOC_STAT: CachePadded<AllocStat> = CachePadded::new(AllocStat::new());

/// A heap buffer aligned to [`PLANE_ALIGNMENT`] bytes, zero-initialized.
///
/// Used for frame planes: the original engine aligns plane storage to
/// `std::hardware_destructive_interference_size` so that SIMD codecs and
/// concurrent plane access never straddle cache lines unexpectedly.
pub struct AlignedBytes {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for AlignedBytes {}
unsafe impl Sync for AlignedBytes {}

impl AlignedBytes {
    pub fn new(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
            };
        }
        let layout = Layout::from_size_align(len, PLANE_ALIGNMENT).expect("invalid plane layout");
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        ALLOC_STAT.record_alloc(len);
        Self { ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: `ptr` is valid for `len` bytes for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: `ptr` is valid for `len` bytes and uniquely borrowed here.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Clone for AlignedBytes {
    fn clone(&self) -> Self {
        let mut copy = Self::new(self.len);
        copy.as_mut_slice().copy_from_slice(self.as_slice());
        copy
    }
}

impl Drop for AlignedBytes {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let layout = Layout::from_size_align(self.len, PLANE_ALIGNMENT).unwrap();
        // SAFETY: `ptr` was allocated with this exact layout in `new`.
        unsafe {
            dealloc(self.ptr.as_ptr(), layout);
        }
        ALLOC_STAT.record_free(self.len);
    }
}

impl std::fmt::Debug for AlignedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBytes").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        let b = AlignedBytes::new(200);
        assert_eq!(b.as_slice().as_ptr() as usize % PLANE_ALIGNMENT, 0);
    }

    #[test]
    fn test_zero_initialized() {
        let b = AlignedBytes::new(64);
        assert!(b.as_slice().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = AlignedBytes::new(64);
        a.as_mut_slice()[0] = 7;
        let b = a.clone();
        assert_eq!(b.as_slice()[0], 7);
        a.as_mut_slice()[0] = 9;
        assert_eq!(b.as_slice()[0], 7);
    }

    #[test]
    fn test_empty_buffer() {
        let b = AlignedBytes::new(0);
        assert!(b.is_empty());
        assert_eq!(b.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn test_alloc_stat_tracks_current_bytes() {
        let before = ALLOC_STAT.get_current();
        let b = AlignedBytes::new(128);
        assert_eq!(ALLOC_STAT.get_current(), before + 128);
        drop(b);
        assert_eq!(ALLOC_STAT.get_current(), before);
    }
}
