//! Block layout: boundary tags and physical neighbor traversal.
use core::num::NonZeroU32;

/// The width of a boundary tag (header or footer word) in bytes.
pub(crate) const WORD: u32 = 4;

/// The alignment unit. Every block size and every payload address is a
/// multiple of this.
pub const ALIGN: usize = 8;

/// The bytes consumed by a block's header and footer.
pub(crate) const OVERHEAD: u32 = 2 * WORD;

/// The smallest block that can exist: a header, the two free-list link
/// words a free block hosts in its payload, and a footer.
pub const MIN_BLOCK_SIZE: usize = 4 * WORD as usize;

/// The largest arena the allocator can address. Offsets and block sizes are
/// stored in 32-bit words.
pub const MAX_ARENA_LEN: usize = (u32::MAX as usize) & !(ALIGN - 1);

/// The bit of a tag indicating whether the block is allocated.
const TAG_ALLOCATED: u32 = 1;
/// The bits of a tag holding the block size.
const TAG_SIZE_MASK: u32 = !(ALIGN as u32 - 1);

/// The address of a payload handed out by [`Heap`](crate::Heap), expressed
/// as a byte offset into the heap's arena.
///
/// A `HeapPtr` is only meaningful to the heap that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapPtr(NonZeroU32);

impl HeapPtr {
    /// The byte offset of the payload within the arena.
    #[inline]
    pub fn offset(self) -> usize {
        self.0.get() as usize
    }
}

#[doc = svgbobdoc::transform!(
/// A block, identified by the arena offset of its header word.
///
/// ```svgbob
///          allocated block                      free block
///   +---------------------------+      +---------------------------+
///   | header: size | 1          |      | header: size | 0          |
///   +---------------------------+      +---------------------------+
///   |                           |      | prev free (offset or 0)   |
///   |         payload           |      +---------------------------+
///   |                           |      | next free (offset or 0)   |
///   |                           |      +---------------------------+
///   |                           |      |         (unused)          |
///   +---------------------------+      +---------------------------+
///   | footer: size | 1          |      | footer: size | 0          |
///   +---------------------------+      +---------------------------+
/// ```
///
/// The codec is trusted: it performs no validation beyond the bounds checks
/// of slice indexing. Callers keep sizes at multiples of [`ALIGN`] and never
/// build a block smaller than [`MIN_BLOCK_SIZE`].
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Block(u32);

impl Block {
    #[inline]
    pub(crate) const fn at(offset: u32) -> Self {
        Self(offset)
    }

    /// The block whose payload starts at `ptr`.
    #[inline]
    pub(crate) fn from_payload(ptr: HeapPtr) -> Self {
        Self(ptr.0.get() - WORD)
    }

    #[inline]
    pub(crate) const fn offset(self) -> u32 {
        self.0
    }

    /// The total block size, including header and footer.
    #[inline]
    pub(crate) fn size(self, arena: &[u8]) -> u32 {
        read_word(arena, self.0) & TAG_SIZE_MASK
    }

    #[inline]
    pub(crate) fn is_allocated(self, arena: &[u8]) -> bool {
        read_word(arena, self.0) & TAG_ALLOCATED != 0
    }

    #[inline]
    pub(crate) fn set_header(self, arena: &mut [u8], size: u32, allocated: bool) {
        write_word(arena, self.0, pack(size, allocated));
    }

    /// Write the footer tag. The footer position follows the size currently
    /// stored in the header, which lets a caller stamp the merged size onto
    /// the last word of a block that is being folded into its predecessor.
    #[inline]
    pub(crate) fn set_footer(self, arena: &mut [u8], size: u32, allocated: bool) {
        write_word(arena, self.footer_offset(arena), pack(size, allocated));
    }

    /// The raw footer word. Used by the consistency checks.
    #[inline]
    pub(crate) fn footer_tag(self, arena: &[u8]) -> u32 {
        read_word(arena, self.footer_offset(arena))
    }

    /// The raw header word.
    #[inline]
    pub(crate) fn header_tag(self, arena: &[u8]) -> u32 {
        read_word(arena, self.0)
    }

    #[inline]
    fn footer_offset(self, arena: &[u8]) -> u32 {
        self.0 + self.size(arena) - WORD
    }

    /// The physically following block.
    #[inline]
    pub(crate) fn next(self, arena: &[u8]) -> Block {
        Block(self.0 + self.size(arena))
    }

    /// The physically preceding block, located through its footer, which is
    /// the word right before this block's header.
    #[inline]
    pub(crate) fn prev(self, arena: &[u8]) -> Block {
        Block(self.0 - (read_word(arena, self.0 - WORD) & TAG_SIZE_MASK))
    }

    #[inline]
    pub(crate) fn payload(self) -> HeapPtr {
        match NonZeroU32::new(self.0 + WORD) {
            Some(offset) => HeapPtr(offset),
            None => unreachable!(),
        }
    }
}

#[inline]
pub(crate) fn pack(size: u32, allocated: bool) -> u32 {
    debug_assert_eq!(size & !TAG_SIZE_MASK, 0, "unaligned block size {}", size);
    size | allocated as u32
}

#[inline]
pub(crate) fn unpack(tag: u32) -> (u32, bool) {
    (tag & TAG_SIZE_MASK, tag & TAG_ALLOCATED != 0)
}

#[inline]
pub(crate) fn read_word(arena: &[u8], offset: u32) -> u32 {
    let i = offset as usize;
    u32::from_le_bytes([arena[i], arena[i + 1], arena[i + 2], arena[i + 3]])
}

#[inline]
pub(crate) fn write_word(arena: &mut [u8], offset: u32, value: u32) {
    let i = offset as usize;
    arena[i..i + WORD as usize].copy_from_slice(&value.to_le_bytes());
}
