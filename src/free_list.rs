//! The explicit free list.
use crate::block::{read_word, write_word, Block, WORD};

/// An unordered, doubly linked list over exactly the set of free blocks.
///
/// The links live inside the free blocks themselves: the word after the
/// header holds the previous free block's header offset and the word after
/// that holds the next one's. Offset `0` (the arena's padding word, never a
/// block header) encodes "none".
///
/// All operations are O(1) except iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeList {
    head: Option<Block>,
    tail: Option<Block>,
}

/// The offset of the previous-free link from the block header.
const PREV_FREE: u32 = WORD;
/// The offset of the next-free link from the block header.
const NEXT_FREE: u32 = 2 * WORD;

impl FreeList {
    /// An empty list.
    pub const INIT: Self = Self {
        head: None,
        tail: None,
    };

    /// Forget every block and become empty.
    #[inline]
    pub fn init(&mut self) {
        *self = Self::INIT;
    }

    #[inline]
    pub fn head(&self) -> Option<Block> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<Block> {
        self.tail
    }

    /// Insert `block` at the head.
    ///
    /// `block` must be free and must not currently be on the list.
    pub fn prepend(&mut self, arena: &mut [u8], block: Block) {
        debug_assert!(!block.is_allocated(arena));
        debug_assert_ne!(self.head, Some(block), "{:?} is already listed", block);

        set_link(arena, block, PREV_FREE, None);
        set_link(arena, block, NEXT_FREE, self.head);
        match self.head {
            Some(head) => set_link(arena, head, PREV_FREE, Some(block)),
            None => self.tail = Some(block),
        }
        self.head = Some(block);
    }

    /// Insert `block` at the tail.
    ///
    /// `block` must be free and must not currently be on the list.
    pub fn append(&mut self, arena: &mut [u8], block: Block) {
        debug_assert!(!block.is_allocated(arena));
        debug_assert_ne!(self.tail, Some(block), "{:?} is already listed", block);

        set_link(arena, block, PREV_FREE, self.tail);
        set_link(arena, block, NEXT_FREE, None);
        match self.tail {
            Some(tail) => set_link(arena, tail, NEXT_FREE, Some(block)),
            None => self.head = Some(block),
        }
        self.tail = Some(block);
    }

    /// Detach `block` from the list. The block's boundary tags are left
    /// untouched.
    ///
    /// # Panics
    ///
    /// Panics if the neighbors' links do not point back at `block`, which
    /// means `block` is not on the list.
    pub fn remove(&mut self, arena: &mut [u8], block: Block) {
        let prev_free = Self::prev_free(arena, block);
        let next_free = Self::next_free(arena, block);

        match prev_free {
            Some(prev_free) => {
                assert_eq!(
                    Self::next_free(arena, prev_free),
                    Some(block),
                    "{:?} is not on the free list",
                    block
                );
                set_link(arena, prev_free, NEXT_FREE, next_free);
            }
            None => {
                assert_eq!(self.head, Some(block), "{:?} is not on the free list", block);
                self.head = next_free;
            }
        }

        match next_free {
            Some(next_free) => {
                debug_assert_eq!(Self::prev_free(arena, next_free), Some(block));
                set_link(arena, next_free, PREV_FREE, prev_free);
            }
            None => {
                assert_eq!(self.tail, Some(block), "{:?} is not on the free list", block);
                self.tail = prev_free;
            }
        }
    }

    /// The block after `block` in list order.
    #[inline]
    pub fn next_free(arena: &[u8], block: Block) -> Option<Block> {
        link(arena, block, NEXT_FREE)
    }

    /// The block before `block` in list order.
    #[inline]
    pub fn prev_free(arena: &[u8], block: Block) -> Option<Block> {
        link(arena, block, PREV_FREE)
    }

    /// Walk the list from head to tail.
    #[inline]
    pub fn iter<'a>(&self, arena: &'a [u8]) -> Iter<'a> {
        Iter {
            arena,
            next: self.head,
        }
    }
}

/// Iterator over a [`FreeList`] in list order.
#[derive(Debug, Clone)]
pub(crate) struct Iter<'a> {
    arena: &'a [u8],
    next: Option<Block>,
}

impl Iterator for Iter<'_> {
    type Item = Block;

    #[inline]
    fn next(&mut self) -> Option<Block> {
        let block = self.next?;
        self.next = FreeList::next_free(self.arena, block);
        Some(block)
    }
}

#[inline]
fn link(arena: &[u8], block: Block, field: u32) -> Option<Block> {
    match read_word(arena, block.offset() + field) {
        0 => None,
        offset => Some(Block::at(offset)),
    }
}

#[inline]
fn set_link(arena: &mut [u8], block: Block, field: u32, target: Option<Block>) {
    write_word(
        arena,
        block.offset() + field,
        target.map_or(0, Block::offset),
    );
}
