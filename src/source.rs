//! Heap sources: the region-growth primitive the allocator is built on.
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::block::MAX_ARENA_LEN;

/// A contiguous byte region that can only grow at its end, like the
/// program break moved by `sbrk`.
///
/// The region starts at offset `0`. The allocator only ever asks for
/// increments that are multiples of [`ALIGN`](crate::ALIGN).
pub trait HeapSource {
    /// Extend the region by exactly `increment` bytes.
    ///
    /// Returns the offset at which the new bytes begin (the previous length
    /// of the region), or `None` if the region cannot grow by that much. A
    /// failed call must leave the region unchanged.
    fn grow(&mut self, increment: usize) -> Option<usize>;

    /// The bytes grown so far.
    fn arena(&self) -> &[u8];

    /// The bytes grown so far.
    fn arena_mut(&mut self) -> &mut [u8];
}

impl<S: HeapSource + ?Sized> HeapSource for &mut S {
    #[inline]
    fn grow(&mut self, increment: usize) -> Option<usize> {
        (**self).grow(increment)
    }

    #[inline]
    fn arena(&self) -> &[u8] {
        (**self).arena()
    }

    #[inline]
    fn arena_mut(&mut self) -> &mut [u8] {
        (**self).arena_mut()
    }
}

/// A fixed-capacity [`HeapSource`] stored inline.
///
/// Usable without `alloc`, and in a `static` through
/// [`Init`](crate::Init).
///
/// # Examples
///
/// ```
/// use tagalloc::{ArraySource, HeapSource, Init};
///
/// let mut source: ArraySource<64> = ArraySource::INIT;
/// assert_eq!(source.grow(48), Some(0));
/// assert_eq!(source.grow(16), Some(48));
/// assert_eq!(source.grow(8), None);
/// assert_eq!(source.arena().len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct ArraySource<const N: usize> {
    buf: [u8; N],
    brk: usize,
}

impl<const N: usize> ArraySource<N> {
    /// An empty region with `N` bytes of capacity.
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            brk: 0,
        }
    }

    /// The number of bytes the region can still grow by.
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.brk
    }
}

impl<const N: usize> Default for ArraySource<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> const_default1::ConstDefault for ArraySource<N> {
    const DEFAULT: Self = Self::new();
}

impl<const N: usize> HeapSource for ArraySource<N> {
    fn grow(&mut self, increment: usize) -> Option<usize> {
        if increment > self.remaining() || self.brk + increment > MAX_ARENA_LEN {
            return None;
        }
        let old_brk = self.brk;
        self.brk += increment;
        Some(old_brk)
    }

    #[inline]
    fn arena(&self) -> &[u8] {
        &self.buf[..self.brk]
    }

    #[inline]
    fn arena_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.brk]
    }
}

/// A [`HeapSource`] backed by a `Vec<u8>`, with an optional limit that
/// simulates memory exhaustion.
///
/// The vector may move when it grows, which is harmless because the
/// allocator addresses the region by offset.
#[cfg(feature = "alloc")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "alloc")))]
#[derive(Debug, Clone)]
pub struct VecSource {
    buf: Vec<u8>,
    limit: usize,
}

#[cfg(feature = "alloc")]
impl VecSource {
    /// A region limited only by the addressable arena size and the global
    /// allocator.
    pub const fn new() -> Self {
        Self::with_limit(MAX_ARENA_LEN)
    }

    /// A region that refuses to grow past `limit` bytes.
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit: if limit < MAX_ARENA_LEN {
                limit
            } else {
                MAX_ARENA_LEN
            },
        }
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(feature = "alloc")]
impl Default for VecSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "alloc")]
impl HeapSource for VecSource {
    fn grow(&mut self, increment: usize) -> Option<usize> {
        let old_len = self.buf.len();
        let new_len = old_len.checked_add(increment)?;
        if new_len > self.limit {
            return None;
        }
        self.buf.try_reserve(increment).ok()?;
        self.buf.resize(new_len, 0);
        Some(old_len)
    }

    #[inline]
    fn arena(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    fn arena_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        #[cfg_attr(feature = "doc_cfg", doc(cfg(unix)))]
        pub use self::unix::MmapSource;
    }
}
