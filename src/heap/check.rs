//! Heap walks: statistics and invariant checking.
use super::Heap;
use crate::{
    block::{pack, unpack, Block, ALIGN, MIN_BLOCK_SIZE, OVERHEAD, WORD},
    error::Corruption,
    free_list::{self, FreeList},
    source::HeapSource,
};

/// Byte and block counts of a heap, excluding the sentinels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// The length of the arena, sentinels and padding included.
    pub arena_len: usize,
    /// The total size of free blocks, boundary tags included.
    pub free_bytes: usize,
    pub free_blocks: usize,
    /// The total size of allocated blocks, boundary tags included.
    pub used_bytes: usize,
    pub used_blocks: usize,
}

/// A block as seen by [`Heap::free_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// The arena offset of the block's header.
    pub offset: usize,
    /// The total block size, boundary tags included.
    pub size: usize,
}

/// Iterator returned by [`Heap::free_blocks`].
#[derive(Debug, Clone)]
pub struct FreeBlocks<'a> {
    arena: &'a [u8],
    inner: free_list::Iter<'a>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = BlockInfo;

    #[inline]
    fn next(&mut self) -> Option<BlockInfo> {
        let block = self.inner.next()?;
        Some(BlockInfo {
            offset: block.offset() as usize,
            size: block.size(self.arena) as usize,
        })
    }
}

impl<S: HeapSource> Heap<S> {
    /// Walk the free list from head to tail.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        let arena = self.source.arena();
        FreeBlocks {
            arena,
            inner: self.free.iter(arena),
        }
    }

    /// Count the bytes and blocks of the heap by walking it in address
    /// order. The heap is assumed to be consistent; see
    /// [`validate`](Self::validate) for a checked walk.
    pub fn stats(&self) -> HeapStats {
        let arena = self.source.arena();
        let mut stats = HeapStats {
            arena_len: arena.len(),
            ..HeapStats::default()
        };

        let mut block = match self.prologue {
            Some(prologue) => prologue.next(arena),
            None => return stats,
        };
        loop {
            let size = block.size(arena) as usize;
            if size == 0 {
                break;
            }
            if block.is_allocated(arena) {
                stats.used_bytes += size;
                stats.used_blocks += 1;
            } else {
                stats.free_bytes += size;
                stats.free_blocks += 1;
            }
            block = block.next(arena);
        }
        stats
    }

    /// Check every structural invariant of the heap:
    ///
    ///  - The sentinels are intact and the blocks between them tile the
    ///    arena exactly.
    ///  - Every block is aligned, at least [`MIN_BLOCK_SIZE`] bytes long,
    ///    and has matching header and footer tags.
    ///  - No two physically adjacent blocks are both free.
    ///  - The free list is a well-formed doubly linked list containing
    ///    exactly the free blocks.
    ///
    /// Runs in time linear in the number of blocks.
    pub fn validate(&self) -> Result<HeapStats, Corruption> {
        let arena = self.source.arena();
        let prologue = self.prologue.ok_or(Corruption::NotInitialized)?;
        let len = arena.len();

        let epilogue_offset = match len.checked_sub(WORD as usize) {
            Some(x) if x > prologue.offset() as usize => x as u32,
            _ => {
                return Err(Corruption::BadSentinel {
                    offset: prologue.offset() as usize,
                })
            }
        };
        let epilogue = Block::at(epilogue_offset);
        if prologue.header_tag(arena) != pack(OVERHEAD, true)
            || prologue.footer_tag(arena) != pack(OVERHEAD, true)
        {
            return Err(Corruption::BadSentinel {
                offset: prologue.offset() as usize,
            });
        }
        if epilogue.header_tag(arena) != pack(0, true) {
            return Err(Corruption::BadSentinel {
                offset: epilogue_offset as usize,
            });
        }

        // Walk the blocks in address order
        let mut stats = HeapStats {
            arena_len: len,
            ..HeapStats::default()
        };
        let mut block = prologue.next(arena);
        let mut prev_free = false;
        while block != epilogue {
            let offset = block.offset() as usize;
            if offset > epilogue_offset as usize || (offset + WORD as usize) % ALIGN != 0 {
                return Err(Corruption::OutOfBounds { offset });
            }

            let (size, allocated) = unpack(block.header_tag(arena));
            if (size as usize) < MIN_BLOCK_SIZE || size as usize % ALIGN != 0 {
                return Err(Corruption::BadSize {
                    offset,
                    size: size as usize,
                });
            }
            if size > epilogue_offset - block.offset() {
                return Err(Corruption::OutOfBounds { offset });
            }

            let header = block.header_tag(arena);
            let footer = block.footer_tag(arena);
            if header != footer {
                return Err(Corruption::TagMismatch {
                    offset,
                    header,
                    footer,
                });
            }

            if allocated {
                stats.used_bytes += size as usize;
                stats.used_blocks += 1;
                prev_free = false;
            } else {
                if prev_free {
                    return Err(Corruption::Uncoalesced {
                        offset: block.prev(arena).offset() as usize,
                    });
                }
                stats.free_bytes += size as usize;
                stats.free_blocks += 1;
                prev_free = true;
            }

            block = block.next(arena);
        }

        // Walk the free list. Each entry must be a free block whose
        // physical predecessor leads back to it (i.e., it is a real block
        // boundary), and the links must agree in both directions. With the
        // entry count equal to the free block count, and no cycles, the
        // list is exactly the free set.
        let mut listed = 0;
        let mut expected_prev = None;
        let mut cur = self.free.head();
        while let Some(entry) = cur {
            let offset = entry.offset() as usize;
            listed += 1;
            if listed > stats.free_blocks {
                return Err(Corruption::FreeListMismatch {
                    listed,
                    free: stats.free_blocks,
                });
            }
            if offset <= prologue.offset() as usize
                || offset >= epilogue_offset as usize
                || (offset + WORD as usize) % ALIGN != 0
                || entry.is_allocated(arena)
                || entry.size(arena) > epilogue_offset - entry.offset()
                || entry.next(arena).prev(arena) != entry
                || FreeList::prev_free(arena, entry) != expected_prev
            {
                return Err(Corruption::BadLink { offset });
            }
            expected_prev = Some(entry);
            cur = FreeList::next_free(arena, entry);
        }
        if self.free.tail() != expected_prev {
            return Err(Corruption::BadLink {
                offset: self.free.tail().map_or(0, |b| b.offset() as usize),
            });
        }
        if listed != stats.free_blocks {
            return Err(Corruption::FreeListMismatch {
                listed,
                free: stats.free_blocks,
            });
        }

        Ok(stats)
    }
}
