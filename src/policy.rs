//! Tunable placement and growth policy.
use crate::block::{ALIGN, MIN_BLOCK_SIZE};

/// The empirically tuned numbers that shape fragmentation.
///
/// None of these follow from first principles; [`Policy::DEFAULT`] carries
/// the values the allocator was tuned with, and [`Heap::with_policy`]
/// accepts alternatives for experimentation.
///
/// All sizes except the entries of `size_rewrites` are total block sizes,
/// i.e., they include the header and footer.
///
/// [`Heap::with_policy`]: crate::Heap::with_policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Payload sizes that are rounded up to another payload size before an
    /// allocation is sized. Pairs of `(requested, replacement)`.
    pub size_rewrites: &'static [(usize, usize)],
    /// A freed block that could not be merged with either neighbor is put at
    /// the head of the free list if its size is at most this, at the tail
    /// otherwise.
    pub prepend_max_isolated: usize,
    /// Like `prepend_max_isolated`, but for a freed block that absorbed its
    /// physical successor.
    pub prepend_max_merged: usize,
    /// Requests of at most this block size are carved from the front of a
    /// free block; larger ones are carved from the back.
    pub small_request_max: usize,
    /// The number of bytes grown by [`Heap::init`](crate::Heap::init) after
    /// the sentinels.
    pub initial_chunk: usize,
    /// The minimum number of bytes grown when no free block fits.
    pub min_grow_chunk: usize,
}

impl Policy {
    /// The tuned defaults.
    pub const DEFAULT: Self = Self {
        size_rewrites: &[(112, 128), (448, 512)],
        prepend_max_isolated: 128,
        prepend_max_merged: 512,
        small_request_max: 64,
        initial_chunk: 1024,
        min_grow_chunk: 512,
    };

    /// Apply `size_rewrites` to a requested payload size.
    #[inline]
    pub fn rewrite(&self, size: usize) -> usize {
        self.size_rewrites
            .iter()
            .find(|&&(from, _)| from == size)
            .map_or(size, |&(_, to)| to)
    }

    /// Check that the growth sizes can form whole blocks.
    ///
    /// # Panics
    ///
    /// Panics if `initial_chunk` or `min_grow_chunk` is not a multiple of
    /// [`ALIGN`] or is smaller than [`MIN_BLOCK_SIZE`], or if a size rewrite
    /// shrinks a request.
    pub(crate) fn assert_valid(&self) {
        for &(name, chunk) in &[
            ("initial_chunk", self.initial_chunk),
            ("min_grow_chunk", self.min_grow_chunk),
        ] {
            assert!(
                chunk % ALIGN == 0 && chunk >= MIN_BLOCK_SIZE,
                "`{}` must be a multiple of {} and at least {} (got {})",
                name,
                ALIGN,
                MIN_BLOCK_SIZE,
                chunk
            );
        }
        for &(from, to) in self.size_rewrites {
            assert!(to >= from, "size rewrite {} -> {} shrinks the request", from, to);
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl const_default1::ConstDefault for Policy {
    const DEFAULT: Self = Self::DEFAULT;
}
