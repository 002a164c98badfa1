//! This crate implements a general-purpose dynamic memory allocator with
//! boundary tags and an explicit free list, managing a single growable
//! memory region.
//!
//!  - **Every block carries its size at both ends.** Neighbor lookups in
//!    either direction take constant time, so freeing a block merges it with
//!    its free neighbors immediately. No two adjacent blocks are ever both
//!    free when an operation returns.
//!
//!  - **Only free blocks are searched.** Free blocks are threaded into a
//!    doubly linked list whose links are stored in their otherwise unused
//!    payloads. Allocation takes the first free block that fits.
//!
//!  - **Reallocation avoids copying.** A block is shrunk in place, or grown
//!    in place into a free successor, before falling back to
//!    allocate-copy-free.
//!
//!  - **The memory comes from a [`HeapSource`]**, an `sbrk`-like primitive
//!    that can only grow a region at its end. Sources backed by an inline
//!    array ([`ArraySource`]), a `Vec` ([`VecSource`]) and an anonymous
//!    memory mapping (`MmapSource`, Unix only) are provided.
//!
//!  - **This crate supports `#![no_std]`.** Blocks are addressed by offsets
//!    into the source's bytes, so the allocator itself contains no `unsafe`
//!    code.
//!
//! The allocator is single-threaded. Concurrent use requires an external
//! lock around every operation.
//!
//! # Examples
//!
//! ```rust
//! use tagalloc::{ArraySource, Heap, Init};
//!
//! let mut heap: Heap<ArraySource<65536>> = Heap::INIT;
//! heap.init().unwrap();
//!
//! let p1 = heap.allocate(100).unwrap();
//! let p2 = heap.allocate(4000).unwrap();
//! heap.payload_mut(p1)[0] = 42;
//! assert_eq!(heap.payload(p1)[0], 42);
//!
//! heap.free(Some(p1));
//! let p3 = heap.reallocate(Some(p2), 16).unwrap();
//! assert_eq!(p3, p2);
//!
//! heap.validate().unwrap();
//! ```
//!
//! # Details
//!
//! ## Tuning
//!
//! Where a freed block goes on the free list, and from which end of a free
//! block an allocation is carved, depend on block sizes. The thresholds, as
//! well as the heap growth sizes, are fields of [`Policy`] and can be
//! overridden per heap with [`Heap::with_policy`].
//!
//! ## Invalid Use
//!
//! Freeing or reallocating something that is not a live allocation is
//! caught by constant-time checks on the boundary tags and panics.
//! [`Heap::validate`] checks every invariant and is meant for tests.
#![no_std]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod block;
mod error;
mod free_list;
mod heap;
mod init;
mod policy;
mod source;
mod utils;
pub use self::{
    block::{HeapPtr, ALIGN, MAX_ARENA_LEN, MIN_BLOCK_SIZE},
    error::{Corruption, InitError},
    heap::{BlockInfo, FreeBlocks, Heap, HeapStats},
    init::Init,
    policy::Policy,
    source::*,
};
