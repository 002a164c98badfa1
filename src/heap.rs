//! The allocator facade.
use core::cmp;

use crate::{
    block::{
        pack, write_word, Block, HeapPtr, ALIGN, MAX_ARENA_LEN, MIN_BLOCK_SIZE, OVERHEAD, WORD,
    },
    error::InitError,
    free_list::FreeList,
    policy::Policy,
    source::HeapSource,
    utils::{align_padding, align_up},
};

mod check;
mod coalesce;
mod fit;

pub use self::check::{BlockInfo, FreeBlocks, HeapStats};

#[doc = svgbobdoc::transform!(
/// A boundary-tag allocator with an explicit free list, managing the region
/// supplied by a [`HeapSource`].
///
/// # Arena Layout
///
/// <center>
/// ```svgbob
///  0    4        12                                         brk-4   brk
///  +----+--------+-------------+-------------+-----+----------+------+
///  |pad |prologue|   block     |   block     | ... |  block   |epilog|
///  |    | 8 | 1  | size | a    | size | a    |     |          | 0 | 1|
///  +----+--------+-------------+-------------+-----+----------+------+
/// ```
/// </center>
///
/// The prologue (an empty, permanently allocated block) and the epilogue
/// (a size-zero, permanently allocated header) let neighbor lookups at the
/// edges of the arena behave like lookups of any other allocated neighbor.
/// Every time the arena grows, the old epilogue word becomes the header of
/// the new block and a fresh epilogue is written at the new end.
///
/// # Invalid Use
///
/// Passing a [`HeapPtr`] that is not a live allocation of this heap (for
/// example, freeing the same pointer twice) is detected by O(1) checks on
/// the block's boundary tags and results in a panic. It never results in
/// undefined behavior: all addressing is bounds-checked.
///
/// # Examples
///
/// ```
/// use tagalloc::{Heap, VecSource};
///
/// let mut heap = Heap::new(VecSource::new());
/// heap.init().unwrap();
///
/// let ptr = heap.allocate(100).unwrap();
/// heap.payload_mut(ptr)[..5].copy_from_slice(b"hello");
///
/// let ptr = heap.reallocate(Some(ptr), 4000).unwrap();
/// assert_eq!(&heap.payload(ptr)[..5], b"hello");
///
/// heap.free(Some(ptr));
/// ```
)]
#[derive(Debug)]
pub struct Heap<S> {
    source: S,
    free: FreeList,
    policy: Policy,
    /// The prologue block. `None` until `init` succeeds.
    prologue: Option<Block>,
}

impl<S> Heap<S> {
    /// Construct an uninitialized heap with [`Policy::DEFAULT`].
    pub const fn new(source: S) -> Self {
        Self {
            source,
            free: FreeList::INIT,
            policy: Policy::DEFAULT,
            prologue: None,
        }
    }

    /// Construct an uninitialized heap with a custom policy.
    ///
    /// # Panics
    ///
    /// Panics if `policy`'s chunk sizes are not multiples of [`ALIGN`] of at
    /// least [`MIN_BLOCK_SIZE`] bytes, or if it rewrites a size downward.
    pub fn with_policy(source: S, policy: Policy) -> Self {
        policy.assert_valid();
        Self {
            policy,
            ..Self::new(source)
        }
    }

    #[inline]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Writing through this can corrupt the heap.
    #[cfg(test)]
    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the heap, returning its source.
    #[inline]
    pub fn into_source(self) -> S {
        self.source
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.prologue.is_some()
    }
}

impl<S: const_default1::ConstDefault> const_default1::ConstDefault for Heap<S> {
    const DEFAULT: Self = Self::new(S::DEFAULT);
}

impl<S: HeapSource> Heap<S> {
    /// Lay down the sentinels and grow the initial chunk.
    ///
    /// Must be called once before any other operation. Fails if the source
    /// cannot supply the memory.
    pub fn init(&mut self) -> Result<(), InitError> {
        if self.is_initialized() {
            return Err(InitError::AlreadyInitialized);
        }

        self.free.init();

        // Pad the start so that block headers land one word before an
        // `ALIGN` boundary and payloads land on one.
        let pad = align_padding(self.source.arena().len(), ALIGN);
        let start = self
            .grow_source(pad + 4 * WORD as usize)
            .ok_or(InitError::OutOfMemory)?
            + pad as u32;

        let arena = self.source.arena_mut();
        write_word(arena, start, 0);
        let prologue = Block::at(start + WORD);
        prologue.set_header(arena, OVERHEAD, true);
        prologue.set_footer(arena, OVERHEAD, true);
        let epilogue = prologue.next(arena);
        epilogue.set_header(arena, 0, true);

        self.extend_heap(self.policy.initial_chunk)
            .ok_or(InitError::OutOfMemory)?;

        self.prologue = Some(prologue);
        log::debug!(
            "heap initialized: prologue at {:#x}, arena is {} bytes",
            prologue.offset(),
            self.source.arena().len()
        );
        Ok(())
    }

    /// Allocate a block with at least `size` bytes of payload.
    ///
    /// Returns `None` if `size` is zero, if the heap is not initialized, or
    /// if the source cannot grow enough to satisfy the request.
    pub fn allocate(&mut self, size: usize) -> Option<HeapPtr> {
        if size == 0 {
            return None;
        }
        if !self.is_initialized() {
            log::debug!("allocate({}) on an uninitialized heap", size);
            return None;
        }

        let size = self.policy.rewrite(size);
        let required = match required_block_size(size) {
            Some(x) => x,
            None => {
                log::debug!("allocate({}): request is too large", size);
                return None;
            }
        };

        let block = match self.find_fit(required) {
            Some(block) => block,
            None => {
                let grow_by = cmp::max(
                    (required as usize).saturating_mul(2),
                    self.policy.min_grow_chunk,
                );
                match self.extend_heap(grow_by) {
                    Some(block) => block,
                    None => {
                        log::debug!("allocate({}): out of memory", size);
                        return None;
                    }
                }
            }
        };

        let block = self.place(block, required);
        Some(block.payload())
    }

    /// Allocate zero-filled room for `count` elements of `size` bytes each.
    ///
    /// Returns `None` if the product overflows or is zero, or if the
    /// allocation fails.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Option<HeapPtr> {
        let len = count.checked_mul(size)?;
        let ptr = self.allocate(len)?;
        self.payload_mut(ptr)[..len].fill(0);
        Some(ptr)
    }

    /// Release an allocation. `None` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn free(&mut self, ptr: Option<HeapPtr>) {
        if let Some(ptr) = ptr {
            let block = self.live_block(ptr);
            self.free_coalesce(block);
        }
    }

    /// Resize an allocation, preserving the first `min(size, old size)`
    /// bytes of its payload.
    ///
    ///  - `reallocate(None, size)` is `allocate(size)`.
    ///  - `reallocate(Some(ptr), 0)` is `free(Some(ptr))` and returns `None`.
    ///
    /// The block is shrunk or grown in place when possible, in which case
    /// the returned pointer equals `ptr`. A resize that needs the same block
    /// size, or would leave less than [`MIN_BLOCK_SIZE`] bytes to split off,
    /// never moves. Growing into a free successor absorbs all of it if the
    /// leftover would be smaller than that. Otherwise the contents are moved to
    /// a new allocation. Returns `None` if that allocation fails, in which
    /// case the original allocation is left intact.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn reallocate(&mut self, ptr: Option<HeapPtr>, size: usize) -> Option<HeapPtr> {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return self.allocate(size),
        };
        if size == 0 {
            self.free(Some(ptr));
            return None;
        }

        let block = self.live_block(ptr);
        let required = required_block_size(size)?;

        if let Some(ptr) = self.reallocate_in_place(block, required) {
            return Some(ptr);
        }

        let old_payload = (block.size(self.source.arena()) - OVERHEAD) as usize;
        let new_ptr = self.allocate(size)?;
        let len = cmp::min(size, old_payload);
        self.source
            .arena_mut()
            .copy_within(ptr.offset()..ptr.offset() + len, new_ptr.offset());
        self.free(Some(ptr));
        Some(new_ptr)
    }

    /// Attempt to resize `block` to `required` bytes without moving it.
    fn reallocate_in_place(&mut self, block: Block, required: u32) -> Option<HeapPtr> {
        let arena = self.source.arena_mut();
        let block_size = block.size(arena);

        if required <= block_size {
            let remainder = block_size - required;
            if remainder as usize >= MIN_BLOCK_SIZE {
                log::trace!("shrinking {:?} from {} to {}", block, block_size, required);
                self.split_off_tail(block, required, remainder);
            }
            // Otherwise the remainder is too small to stand alone as a block,
            // and the block already fits.
            return Some(block.payload());
        }

        let next = block.next(arena);
        if next.is_allocated(arena) {
            return None;
        }
        let total = block_size + next.size(arena);
        if total < required {
            return None;
        }

        log::trace!(
            "growing {:?} from {} to {} into {:?}",
            block,
            block_size,
            required,
            next
        );
        self.free.remove(arena, next);
        let remainder = total - required;
        if remainder as usize >= MIN_BLOCK_SIZE {
            self.split_off_tail(block, required, remainder);
        } else {
            block.set_header(arena, total, true);
            block.set_footer(arena, total, true);
        }
        Some(block.payload())
    }

    /// Make `block` an allocated block of `size` bytes and free the
    /// `remainder` bytes after it as a separate block.
    fn split_off_tail(&mut self, block: Block, size: u32, remainder: u32) {
        let arena = self.source.arena_mut();
        block.set_header(arena, size, true);
        block.set_footer(arena, size, true);

        let leftover = block.next(arena);
        leftover.set_header(arena, remainder, false);
        leftover.set_footer(arena, remainder, false);
        self.free_coalesce(leftover);
    }

    /// The payload capacity of a live allocation, which is at least the size
    /// it was requested with.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn usable_size(&self, ptr: HeapPtr) -> usize {
        let block = self.live_block(ptr);
        (block.size(self.source.arena()) - OVERHEAD) as usize
    }

    /// The payload of a live allocation, [`usable_size`](Self::usable_size)
    /// bytes long.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let len = self.usable_size(ptr);
        &self.source.arena()[ptr.offset()..ptr.offset() + len]
    }

    /// The payload of a live allocation, [`usable_size`](Self::usable_size)
    /// bytes long.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let len = self.usable_size(ptr);
        &mut self.source.arena_mut()[ptr.offset()..ptr.offset() + len]
    }

    /// Find the block of a live allocation, checking its boundary tags.
    fn live_block(&self, ptr: HeapPtr) -> Block {
        let arena = self.source.arena();
        let first = match self.prologue {
            Some(prologue) => prologue.offset() + OVERHEAD,
            None => panic!("{:?} cannot belong to an uninitialized heap", ptr),
        };
        let block = Block::from_payload(ptr);
        let epilogue = arena.len() as u32 - WORD;

        assert!(
            ptr.offset() % ALIGN == 0 && block.offset() >= first && block.offset() < epilogue,
            "{:?} is not an allocation of this heap",
            ptr
        );
        let size = block.size(arena);
        assert!(
            block.is_allocated(arena) && size as usize >= MIN_BLOCK_SIZE,
            "{:?} is not a live allocation (double free?)",
            ptr
        );
        assert!(
            size <= epilogue - block.offset() && block.header_tag(arena) == block.footer_tag(arena),
            "{:?} has damaged boundary tags",
            ptr
        );
        block
    }

    /// Grow the arena by `size` bytes, turn the new region into a free block
    /// and coalesce it with the last block of the old arena.
    ///
    /// Returns the resulting free block, or `None` if the source is
    /// exhausted.
    fn extend_heap(&mut self, size: usize) -> Option<Block> {
        let brk = self.grow_source(size)?;
        debug_assert_eq!(size % ALIGN, 0);
        log::trace!("grew the arena by {} bytes at {:#x}", size, brk);

        // The new region starts right after the old epilogue word
        let arena = self.source.arena_mut();
        let block = Block::at(brk - WORD);
        debug_assert_eq!(block.header_tag(arena), pack(0, true));
        block.set_header(arena, size as u32, false);
        block.set_footer(arena, size as u32, false);
        block.next(arena).set_header(arena, 0, true);

        Some(self.free_coalesce(block))
    }

    /// Grow the source, keeping the arena addressable by 32-bit offsets.
    fn grow_source(&mut self, size: usize) -> Option<u32> {
        let len = self.source.arena().len();
        if size > MAX_ARENA_LEN - cmp::min(len, MAX_ARENA_LEN) {
            return None;
        }
        let brk = self.source.grow(size)?;
        debug_assert_eq!(brk, len, "the source did not grow at the end");
        Some(brk as u32)
    }
}

/// The block size for a payload of `size` bytes: the payload plus header and
/// footer, rounded up to [`ALIGN`]. `None` if it cannot be represented.
#[inline]
fn required_block_size(size: usize) -> Option<u32> {
    let size = align_up(size.checked_add(OVERHEAD as usize)?, ALIGN)?;
    if size > MAX_ARENA_LEN {
        return None;
    }
    Some(size as u32)
}

#[cfg(test)]
mod tests;
