//! Free block search and splitting.
use super::Heap;
use crate::{
    block::{Block, MIN_BLOCK_SIZE},
    source::HeapSource,
};

impl<S: HeapSource> Heap<S> {
    /// Find the first block on the free list that is at least `size` bytes
    /// long.
    ///
    /// Only the free list is scanned, never the whole arena.
    pub(super) fn find_fit(&self, size: u32) -> Option<Block> {
        let arena = self.source.arena();
        self.free.iter(arena).find(|block| {
            debug_assert!(!block.is_allocated(arena));
            block.size(arena) >= size
        })
    }

    /// Allocate `size` bytes out of the free block `block`, which must be at
    /// least that large.
    ///
    /// If the leftover can form a block of its own, the block is split:
    ///
    ///  - A small request takes the front. The leftover moves to the back
    ///    and is appended to the free list.
    ///  - A large request takes the back. `block` stays where it is on the
    ///    free list and simply shrinks to represent the leftover.
    ///
    /// Otherwise the whole block is allocated.
    ///
    /// Returns the allocated block.
    pub(super) fn place(&mut self, block: Block, size: u32) -> Block {
        let arena = self.source.arena_mut();
        let block_size = block.size(arena);
        debug_assert!(!block.is_allocated(arena));
        debug_assert!(block_size >= size);

        let remainder = block_size - size;

        if remainder as usize >= MIN_BLOCK_SIZE && size as usize <= self.policy.small_request_max {
            log::trace!("place {} bytes at the front of {:?}", size, block);
            self.free.remove(arena, block);
            block.set_header(arena, size, true);
            block.set_footer(arena, size, true);

            let leftover = block.next(arena);
            leftover.set_header(arena, remainder, false);
            leftover.set_footer(arena, remainder, false);
            self.free.append(arena, leftover);
            block
        } else if remainder as usize >= MIN_BLOCK_SIZE {
            log::trace!("place {} bytes at the back of {:?}", size, block);
            block.set_header(arena, remainder, false);
            block.set_footer(arena, remainder, false);

            let used = block.next(arena);
            used.set_header(arena, size, true);
            used.set_footer(arena, size, true);
            used
        } else {
            self.free.remove(arena, block);
            block.set_header(arena, block_size, true);
            block.set_footer(arena, block_size, true);
            block
        }
    }
}
