use core::fmt;

/// The error type returned by [`Heap::init`](crate::Heap::init).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The heap source could not supply the sentinels or the initial chunk.
    OutOfMemory,
    /// `init` was already called successfully on this heap.
    AlreadyInitialized,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("the heap source is exhausted"),
            Self::AlreadyInitialized => f.write_str("the heap is already initialized"),
        }
    }
}

/// An invariant violation found by [`Heap::validate`](crate::Heap::validate).
///
/// Offsets are arena offsets of block headers unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// The heap has not been initialized.
    NotInitialized,
    /// The prologue or the epilogue sentinel was overwritten.
    BadSentinel { offset: usize },
    /// A block header is not where the alignment rules put it, or a block
    /// extends past the epilogue.
    OutOfBounds { offset: usize },
    /// A block is smaller than the minimum or its size is not aligned.
    BadSize { offset: usize, size: usize },
    /// A block's header and footer disagree.
    TagMismatch { offset: usize, header: u32, footer: u32 },
    /// Two physically adjacent blocks are both free.
    Uncoalesced { offset: usize },
    /// A free-list entry is allocated, or its links are not mutually
    /// consistent with its neighbors.
    BadLink { offset: usize },
    /// The free list and the set of free blocks differ in size, or the list
    /// contains a cycle.
    FreeListMismatch { listed: usize, free: usize },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NotInitialized => f.write_str("heap is not initialized"),
            Self::BadSentinel { offset } => write!(f, "sentinel at {:#x} is damaged", offset),
            Self::OutOfBounds { offset } => write!(f, "block at {:#x} is out of bounds", offset),
            Self::BadSize { offset, size } => {
                write!(f, "block at {:#x} has invalid size {}", offset, size)
            }
            Self::TagMismatch {
                offset,
                header,
                footer,
            } => write!(
                f,
                "block at {:#x} has header {:#x} but footer {:#x}",
                offset, header, footer
            ),
            Self::Uncoalesced { offset } => {
                write!(f, "free block at {:#x} is followed by a free block", offset)
            }
            Self::BadLink { offset } => write!(f, "free-list entry at {:#x} is broken", offset),
            Self::FreeListMismatch { listed, free } => write!(
                f,
                "free list holds {} entries but the heap has {} free blocks",
                listed, free
            ),
        }
    }
}

#[cfg(feature = "std")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "std")))]
impl std::error::Error for InitError {}

#[cfg(feature = "std")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "std")))]
impl std::error::Error for Corruption {}
