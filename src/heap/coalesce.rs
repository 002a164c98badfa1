//! Merging freed blocks with their free physical neighbors.
use super::Heap;
use crate::{block::Block, source::HeapSource};

impl<S: HeapSource> Heap<S> {
    /// Mark `block` free, merge it with any free physical neighbor, and
    /// make sure the result is on the free list.
    ///
    /// Returns the merged block, which is `block` itself or its physical
    /// predecessor.
    ///
    /// When the predecessor absorbs `block`, the predecessor's free-list node
    /// is reused as is: list position does not depend on size, so its links
    /// stay valid and no list operation is needed.
    pub(super) fn free_coalesce(&mut self, block: Block) -> Block {
        let arena = self.source.arena_mut();

        let mut size = block.size(arena);
        block.set_header(arena, size, false);
        block.set_footer(arena, size, false);

        let prev = block.prev(arena);
        let next = block.next(arena);

        match (prev.is_allocated(arena), next.is_allocated(arena)) {
            (true, true) => {
                log::trace!("coalesce {:?}: isolated ({} bytes)", block, size);
                if size as usize <= self.policy.prepend_max_isolated {
                    self.free.prepend(arena, block);
                } else {
                    self.free.append(arena, block);
                }
                block
            }
            (true, false) => {
                log::trace!("coalesce {:?}: absorbing next {:?}", block, next);
                self.free.remove(arena, next);
                size += next.size(arena);
                block.set_header(arena, size, false);
                block.set_footer(arena, size, false);

                if size as usize <= self.policy.prepend_max_merged {
                    self.free.prepend(arena, block);
                } else {
                    self.free.append(arena, block);
                }
                block
            }
            (false, true) => {
                log::trace!("coalesce {:?}: absorbed by prev {:?}", block, prev);
                size += prev.size(arena);
                prev.set_header(arena, size, false);
                // `block`'s header still holds its own size, so this lands on
                // the last word of the merged extent
                block.set_footer(arena, size, false);
                prev
            }
            (false, false) => {
                log::trace!(
                    "coalesce {:?}: absorbed by prev {:?} along with next {:?}",
                    block,
                    prev,
                    next
                );
                self.free.remove(arena, next);
                size += prev.size(arena) + next.size(arena);
                prev.set_header(arena, size, false);
                next.set_footer(arena, size, false);
                prev
            }
        }
    }
}
