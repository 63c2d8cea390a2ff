// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Page-aligned, zero-initialised transfer buffers.
//!
//! The NVMe-MI tunnel and some HBAs require the data buffer to start on a
//! page boundary. The buffer remembers its layout so it is released with the
//! same size and alignment it was allocated with.

use std::{
    alloc::{Layout, alloc_zeroed, dealloc},
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::models::error::PtError;

/// Fallback used where the platform page size is not queryable.
const DEFAULT_PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no memory-safety preconditions.
        let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if sz > 0 {
            return sz as usize;
        }
    }
    DEFAULT_PAGE_SIZE
}

/// True when `buf` starts on a page boundary.
pub fn is_page_aligned(buf: &[u8]) -> bool {
    (buf.as_ptr() as usize) % page_size() == 0
}

pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer is uniquely owned heap memory.
unsafe impl Send for AlignedBuf {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocate `len` zeroed bytes aligned to the page size. A zero length
    /// still allocates one page so the pointer is always page aligned.
    pub fn new(len: usize) -> Result<Self, PtError> {
        Self::with_alignment(len, page_size())
    }

    pub fn with_alignment(len: usize, align: usize) -> Result<Self, PtError> {
        let layout = Layout::from_size_align(len.max(1), align)
            .map_err(|e| PtError::syntax(format!("bad buffer layout: {e}")))?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| PtError::os(libc::ENOMEM, "aligned buffer allocation failed"))?;
        Ok(Self { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialised bytes while self lives.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: unique access through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: allocated in with_alignment with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_page_aligned_and_zeroed() {
        let mut b = AlignedBuf::new(1000).expect("alloc");
        assert_eq!(b.len(), 1000);
        assert!(is_page_aligned(&b));
        assert!(b.iter().all(|&x| x == 0));
        b[999] = 7;
        assert_eq!(b[999], 7);
    }

    #[test]
    fn empty_buffer_still_aligned() {
        let b = AlignedBuf::new(0).expect("alloc");
        assert!(b.is_empty());
        assert_eq!(b.as_ptr() as usize % page_size(), 0);
    }
}
