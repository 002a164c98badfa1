use quickcheck_macros::quickcheck;
use std::prelude::v1::*;

use super::*;
use crate::{
    error::Corruption,
    init::Init,
    source::{ArraySource, VecSource},
    tests::TrackingSource,
};

fn new_heap() -> Heap<VecSource> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut heap = Heap::new(VecSource::new());
    heap.init().unwrap();
    heap
}

/// The free list as `(header offset, size)` pairs, head first.
fn free_list<S: HeapSource>(heap: &Heap<S>) -> Vec<(usize, usize)> {
    heap.free_blocks().map(|b| (b.offset, b.size)).collect()
}

macro_rules! gen_test {
    ($mod:ident, $source:expr) => {
        mod $mod {
            use super::*;

            fn new_tracked_heap() -> Heap<TrackingSource<impl HeapSource>> {
                let _ = env_logger::builder().is_test(true).try_init();
                let mut heap = Heap::new(TrackingSource::new($source));
                heap.init().unwrap();
                heap
            }

            #[test]
            fn minimal() {
                let mut heap = new_tracked_heap();
                log::trace!("stats = {:?}", heap.stats());

                let ptr = heap.allocate(1);
                log::trace!("ptr = {:?}", ptr);
                heap.free(ptr);
                heap.validate().unwrap();
            }

            #[test]
            fn reuse_cycle_does_not_grow() {
                let mut heap = new_tracked_heap();
                let grow_calls = heap.source().grow_calls;

                let ptr = heap.allocate(200).unwrap();
                heap.free(Some(ptr));
                assert_eq!(heap.allocate(200), Some(ptr));
                assert_eq!(heap.source().grow_calls, grow_calls);
            }

            #[test]
            fn fill_and_drain() {
                let mut heap = new_tracked_heap();
                let mut ptrs = Vec::new();
                for i in 0..64 {
                    if let Some(ptr) = heap.allocate(1 + i * 37 % 300) {
                        ptrs.push(ptr);
                    }
                }
                heap.validate().unwrap();

                // Free every other allocation, then the rest
                for ptr in ptrs.iter().step_by(2) {
                    heap.free(Some(*ptr));
                }
                heap.validate().unwrap();
                for ptr in ptrs.iter().skip(1).step_by(2) {
                    heap.free(Some(*ptr));
                }

                // Everything merges back into a single free block
                let stats = heap.validate().unwrap();
                assert_eq!(stats.used_blocks, 0);
                assert_eq!(stats.free_blocks, 1);
            }

            #[quickcheck]
            fn random(max_alloc_size: usize, bytecode: Vec<u8>) {
                random_inner(max_alloc_size, bytecode);
            }

            fn random_inner(max_alloc_size: usize, bytecode: Vec<u8>) -> Option<()> {
                let max_alloc_size = max_alloc_size % 0x4000 + 1;

                let mut heap = new_tracked_heap();
                macro_rules! sa {
                    () => {
                        heap.source_mut().sa
                    };
                }

                #[derive(Debug)]
                struct Alloc {
                    ptr: HeapPtr,
                    len: usize,
                    fill: u8,
                }
                let mut allocs: Vec<Alloc> = Vec::new();

                let mut it = bytecode.iter().cloned();
                loop {
                    match it.next()? % 9 {
                        0..=2 => {
                            let len = u32::from_le_bytes([
                                it.next()?,
                                it.next()?,
                                it.next()?,
                                0,
                            ]);
                            let len = ((len as u64 * max_alloc_size as u64) >> 24) as usize;
                            let fill = it.next()?;
                            log::trace!("alloc {:?}", len);

                            let ptr = heap.allocate(len);
                            log::trace!(" → {:?}", ptr);

                            if let Some(ptr) = ptr {
                                assert!(len > 0);
                                assert!(heap.usable_size(ptr) >= len);
                                sa!().allocate(ptr, len);
                                heap.payload_mut(ptr)[..len].fill(fill);
                                allocs.push(Alloc { ptr, len, fill });
                            }
                        }
                        3..=5 => {
                            let alloc_i = it.next()?;
                            if !allocs.is_empty() {
                                let alloc = allocs.swap_remove(alloc_i as usize % allocs.len());
                                log::trace!("dealloc {:?}", alloc);

                                assert!(heap.payload(alloc.ptr)[..alloc.len]
                                    .iter()
                                    .all(|&b| b == alloc.fill));
                                heap.free(Some(alloc.ptr));
                                sa!().deallocate(alloc.ptr, alloc.len);
                            }
                        }
                        6..=7 => {
                            let alloc_i = it.next()?;
                            if !allocs.is_empty() {
                                let len = u32::from_le_bytes([
                                    it.next()?,
                                    it.next()?,
                                    it.next()?,
                                    0,
                                ]);
                                let len = ((len as u64 * max_alloc_size as u64) >> 24) as usize;

                                let alloc_i = alloc_i as usize % allocs.len();
                                let alloc = &mut allocs[alloc_i];
                                log::trace!("realloc {:?} to {:?}", alloc, len);

                                if len == 0 {
                                    assert_eq!(heap.reallocate(Some(alloc.ptr), 0), None);
                                    sa!().deallocate(alloc.ptr, alloc.len);
                                    allocs.swap_remove(alloc_i);
                                } else if let Some(ptr) = heap.reallocate(Some(alloc.ptr), len) {
                                    log::trace!(" {:?} → {:?}", alloc.ptr, ptr);
                                    sa!().deallocate(alloc.ptr, alloc.len);
                                    sa!().allocate(ptr, len);

                                    let kept = alloc.len.min(len);
                                    let payload = heap.payload_mut(ptr);
                                    assert!(payload[..kept].iter().all(|&b| b == alloc.fill));
                                    payload[..len].fill(alloc.fill);

                                    alloc.ptr = ptr;
                                    alloc.len = len;
                                } else {
                                    log::trace!(" {:?} → fail", alloc.ptr);
                                    assert!(heap.payload(alloc.ptr)[..alloc.len]
                                        .iter()
                                        .all(|&b| b == alloc.fill));
                                }
                            }
                        }
                        8 => {
                            // Allocate and immediately free; only growth may
                            // change the free byte count
                            let len = u16::from_le_bytes([it.next()?, it.next()?]) as usize;
                            let len = len % max_alloc_size + 1;
                            let before = heap.stats();
                            log::trace!("alloc+dealloc {:?}", len);

                            if let Some(ptr) = heap.allocate(len) {
                                sa!().allocate(ptr, len);
                                heap.free(Some(ptr));
                                sa!().deallocate(ptr, len);
                            }

                            let after = heap.stats();
                            assert_eq!(
                                after.free_bytes,
                                before.free_bytes + (after.arena_len - before.arena_len)
                            );
                            assert_eq!(after.used_bytes, before.used_bytes);
                        }
                        _ => unreachable!(),
                    }

                    let stats = heap.validate().unwrap();
                    assert_eq!(stats.used_blocks, allocs.len());
                }
            }

            #[quickcheck]
            fn round_trip(sizes: Vec<u16>, free_order: Vec<u8>) {
                let mut heap = new_tracked_heap();

                let mut ptrs: Vec<HeapPtr> = sizes
                    .iter()
                    .take(40)
                    .filter_map(|&size| heap.allocate(size as usize % 3000 + 1))
                    .collect();
                log::trace!("allocated {:?}", ptrs);

                // Free in the order picked by `free_order`
                let mut order = free_order.iter().cycle();
                while !ptrs.is_empty() {
                    let i = order.next().map_or(0, |&i| i as usize) % ptrs.len();
                    heap.free(Some(ptrs.swap_remove(i)));
                }

                let stats = heap.validate().unwrap();
                assert_eq!(stats.used_blocks, 0);
                assert_eq!(stats.free_blocks, 1);

                // The whole free extent serves one request without growing
                let grow_calls = heap.source().grow_calls;
                let ptr = heap.allocate(stats.free_bytes - 8).unwrap();
                assert_eq!(heap.source().grow_calls, grow_calls);
                assert_eq!(heap.usable_size(ptr), stats.free_bytes - 8);

                let stats = heap.validate().unwrap();
                assert_eq!(stats.used_blocks, 1);
                assert_eq!(stats.free_blocks, 0);
            }
        }
    };
}

gen_test!(vec_source, VecSource::new());
gen_test!(array_source, ArraySource::<65536>::new());

#[test]
fn init_lays_out_sentinels_and_initial_chunk() {
    let heap = new_heap();
    assert!(heap.is_initialized());
    assert_eq!(free_list(&heap), [(12, 1024)]);

    let stats = heap.validate().unwrap();
    assert_eq!(
        stats,
        HeapStats {
            arena_len: 1040,
            free_bytes: 1024,
            free_blocks: 1,
            used_bytes: 0,
            used_blocks: 0,
        }
    );
}

#[test]
fn init_twice() {
    let mut heap = new_heap();
    assert_eq!(heap.init(), Err(InitError::AlreadyInitialized));
    heap.validate().unwrap();
}

#[test]
fn init_out_of_memory() {
    let mut heap = Heap::new(VecSource::with_limit(512));
    assert_eq!(heap.init(), Err(InitError::OutOfMemory));
    assert!(!heap.is_initialized());
    assert_eq!(heap.allocate(8), None);
    assert_eq!(heap.validate(), Err(Corruption::NotInitialized));
}

#[test]
fn init_pads_unaligned_source() {
    let mut source = VecSource::new();
    assert_eq!(source.grow(3), Some(0));

    let mut heap = Heap::new(source);
    heap.init().unwrap();
    assert_eq!(free_list(&heap), [(20, 1024)]);

    let ptr = heap.allocate(8).unwrap();
    assert_eq!(ptr.offset() % ALIGN, 0);
    assert_eq!(ptr.offset(), 24);
    heap.validate().unwrap();
}

#[test]
fn const_init() {
    let mut heap: Heap<ArraySource<4096>> = Heap::INIT;
    assert!(!heap.is_initialized());
    assert_eq!(heap.allocate(1), None);

    heap.init().unwrap();
    let ptr = heap.allocate(1000).unwrap();
    heap.free(Some(ptr));
    heap.validate().unwrap();
}

#[test]
fn zero_sized_requests() {
    let mut heap = new_heap();
    assert_eq!(heap.allocate(0), None);
    assert_eq!(heap.allocate_zeroed(0, 16), None);
    assert_eq!(heap.reallocate(None, 0), None);
    heap.free(None);
    assert_eq!(free_list(&heap), [(12, 1024)]);
}

#[test]
fn oversized_requests() {
    let mut heap = new_heap();
    assert_eq!(heap.allocate(usize::MAX), None);
    assert_eq!(heap.allocate(MAX_ARENA_LEN), None);
    assert_eq!(heap.allocate_zeroed(usize::MAX, 2), None);
    heap.validate().unwrap();
}

/// Allocate 100, allocate 4000, free the first, allocate 90.
#[test]
fn first_fit_reuses_freed_region() {
    let mut heap = new_heap();

    // A large request is carved from the back of the initial chunk
    let p1 = heap.allocate(100).unwrap();
    assert_eq!(p1.offset(), 928);
    assert_eq!(free_list(&heap), [(12, 912)]);

    // No fit; the arena grows by twice the block size
    let p2 = heap.allocate(4000).unwrap();
    assert_eq!(p2.offset(), 5048);
    assert_eq!(heap.stats().arena_len, 1040 + 8016);
    assert_eq!(free_list(&heap), [(12, 912), (1036, 4008)]);

    // Both neighbors are free; all three merge
    heap.free(Some(p1));
    assert_eq!(free_list(&heap), [(12, 5032)]);

    let arena_len = heap.stats().arena_len;
    let p3 = heap.allocate(90).unwrap();
    assert_eq!(p3.offset(), 4944);
    assert_eq!(heap.stats().arena_len, arena_len);
    assert!((12..12 + 5032).contains(&p3.offset()));

    let stats = heap.validate().unwrap();
    assert_eq!(stats.used_blocks, 2);
    assert_eq!(stats.used_bytes, 4008 + 104);
}

#[test]
fn shrink_in_place() {
    let mut heap = new_heap();
    let ptr = heap.allocate(30).unwrap();
    assert_eq!(ptr.offset(), 16);
    assert_eq!(heap.usable_size(ptr), 32);
    for (i, b) in heap.payload_mut(ptr)[..30].iter_mut().enumerate() {
        *b = i as u8;
    }

    assert_eq!(heap.reallocate(Some(ptr), 16), Some(ptr));
    assert_eq!(heap.usable_size(ptr), 16);
    assert_eq!(heap.payload(ptr), &(0..16).collect::<Vec<u8>>()[..]);

    // The split-off tail merged with the free block after it
    assert_eq!(free_list(&heap), [(36, 1000)]);
    heap.validate().unwrap();
}

#[test]
fn shrink_with_small_remainder_keeps_block() {
    let mut heap = new_heap();
    let ptr = heap.allocate(30).unwrap();
    assert_eq!(heap.reallocate(Some(ptr), 24), Some(ptr));
    assert_eq!(heap.usable_size(ptr), 32);

    // Same block size
    assert_eq!(heap.reallocate(Some(ptr), 32), Some(ptr));
    assert_eq!(heap.usable_size(ptr), 32);
    assert_eq!(free_list(&heap), [(52, 984)]);
}

#[test]
fn grow_in_place_splits_successor() {
    let mut heap = new_heap();
    let ptr = heap.allocate(30).unwrap();
    heap.payload_mut(ptr)[..30].fill(0x5a);

    assert_eq!(heap.reallocate(Some(ptr), 100), Some(ptr));
    assert_eq!(heap.usable_size(ptr), 104);
    assert!(heap.payload(ptr)[..30].iter().all(|&b| b == 0x5a));
    assert_eq!(free_list(&heap), [(124, 912)]);
    heap.validate().unwrap();
}

#[test]
fn grow_in_place_absorbs_successor() {
    let mut heap = new_heap();
    let p = heap.allocate(30).unwrap();
    let q = heap.allocate(30).unwrap();
    let _r = heap.allocate(30).unwrap();
    heap.free(Some(q));
    assert_eq!(free_list(&heap), [(52, 40), (132, 904)]);

    assert_eq!(heap.reallocate(Some(p), 70), Some(p));
    assert_eq!(heap.usable_size(p), 72);
    assert_eq!(free_list(&heap), [(132, 904)]);
    heap.validate().unwrap();
}

#[test]
fn grow_moves_when_successor_is_too_small() {
    let mut heap = new_heap();
    let p = heap.allocate(30).unwrap();
    let q = heap.allocate(30).unwrap();
    let _r = heap.allocate(30).unwrap();
    heap.free(Some(q));
    heap.payload_mut(p)[..30].fill(0xc3);

    let p2 = heap.reallocate(Some(p), 76).unwrap();
    assert_eq!(p2.offset(), 952);
    assert!(heap.payload(p2)[..30].iter().all(|&b| b == 0xc3));

    // The old block merged with the free block after it
    assert_eq!(free_list(&heap), [(12, 80), (132, 816)]);
    heap.validate().unwrap();
}

#[test]
fn grow_moves_when_successor_is_allocated() {
    let mut heap = new_heap();
    let p = heap.allocate(30).unwrap();
    let _q = heap.allocate(30).unwrap();
    heap.payload_mut(p)[..30].fill(0x11);

    let p2 = heap.reallocate(Some(p), 100).unwrap();
    assert_eq!(p2.offset(), 928);
    assert!(heap.payload(p2)[..30].iter().all(|&b| b == 0x11));
    assert_eq!(free_list(&heap), [(12, 40), (92, 832)]);
    heap.validate().unwrap();
}

#[test]
fn reallocate_failure_keeps_allocation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut heap = Heap::new(VecSource::with_limit(2048));
    heap.init().unwrap();

    let ptr = heap.allocate(100).unwrap();
    heap.payload_mut(ptr)[..100].fill(0x77);

    assert_eq!(heap.reallocate(Some(ptr), 2000), None);
    assert_eq!(heap.usable_size(ptr), 104);
    assert!(heap.payload(ptr)[..100].iter().all(|&b| b == 0x77));
    heap.validate().unwrap();

    heap.free(Some(ptr));
    assert_eq!(free_list(&heap), [(12, 1024)]);
}

#[test]
fn reallocate_edge_cases() {
    let mut heap = new_heap();

    let ptr = heap.reallocate(None, 100).unwrap();
    assert_eq!(ptr.offset(), 928);

    assert_eq!(heap.reallocate(Some(ptr), 0), None);
    assert_eq!(free_list(&heap), [(12, 1024)]);
    heap.validate().unwrap();
}

#[test]
fn out_of_memory() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut heap = Heap::new(VecSource::with_limit(2048));
    heap.init().unwrap();

    assert_eq!(heap.allocate(2000), None);
    assert_eq!(heap.stats().arena_len, 1040);
    heap.validate().unwrap();

    // The heap is still usable
    let ptr = heap.allocate(500).unwrap();
    heap.free(Some(ptr));
    assert_eq!(free_list(&heap), [(12, 1024)]);
}

#[test]
fn coalesce_with_next_then_with_both() {
    let mut heap = new_heap();
    let a = heap.allocate(24).unwrap();
    let b = heap.allocate(24).unwrap();
    let c = heap.allocate(24).unwrap();
    let d = heap.allocate(24).unwrap();
    assert_eq!(free_list(&heap), [(140, 896)]);

    // Isolated and small: goes to the head
    heap.free(Some(b));
    assert_eq!(free_list(&heap), [(44, 32), (140, 896)]);

    // Absorbed by the free predecessor, which keeps its list position
    heap.free(Some(c));
    assert_eq!(free_list(&heap), [(44, 64), (140, 896)]);

    // Both neighbors free
    heap.free(Some(d));
    assert_eq!(free_list(&heap), [(44, 992)]);

    // Absorbing the free successor; the result is large, so it goes to the
    // tail
    heap.free(Some(a));
    assert_eq!(free_list(&heap), [(12, 1024)]);
    heap.validate().unwrap();
}

#[test]
fn coalesce_with_next_small_result_goes_to_head() {
    let mut heap = new_heap();
    let x = heap.allocate(24).unwrap();
    let y = heap.allocate(24).unwrap();
    let _z = heap.allocate(24).unwrap();

    heap.free(Some(y));
    assert_eq!(free_list(&heap), [(44, 32), (108, 928)]);

    heap.free(Some(x));
    assert_eq!(free_list(&heap), [(12, 64), (108, 928)]);
    heap.validate().unwrap();
}

#[test]
fn coalesce_with_next_large_result_goes_to_tail() {
    let mut heap = new_heap();
    let a = heap.allocate(24).unwrap();
    let _b = heap.allocate(24).unwrap();
    let c = heap.allocate(24).unwrap();

    heap.free(Some(a));
    assert_eq!(free_list(&heap), [(12, 32), (108, 928)]);

    heap.free(Some(c));
    assert_eq!(free_list(&heap), [(12, 32), (76, 960)]);
    heap.validate().unwrap();
}

#[test]
fn coalesce_with_next_at_merged_threshold_goes_to_head() {
    let mut heap = new_heap();
    let a = heap.allocate(24).unwrap();
    let _g = heap.allocate(24).unwrap();
    let p = heap.allocate(24).unwrap();
    let _q = heap.allocate(440).unwrap();
    let r = heap.allocate(472).unwrap();
    assert!(free_list(&heap).is_empty());

    heap.free(Some(a));
    heap.free(Some(r));
    assert_eq!(free_list(&heap), [(12, 32), (108, 480)]);

    // 32 + 480 is exactly `prepend_max_merged`
    heap.free(Some(p));
    assert_eq!(free_list(&heap), [(76, 512), (12, 32)]);
    heap.validate().unwrap();
}

#[test]
fn isolated_at_threshold_goes_to_head() {
    let mut heap = new_heap();
    let x = heap.allocate(24).unwrap();
    let y = heap.allocate(120).unwrap();
    let _z = heap.allocate(856).unwrap();
    assert!(free_list(&heap).is_empty());

    heap.free(Some(x));
    // Exactly `prepend_max_isolated`
    heap.free(Some(y));
    assert_eq!(free_list(&heap), [(908, 128), (12, 32)]);
    heap.validate().unwrap();
}

/// Build a heap with an isolated 32-byte block `a` and an isolated 208-byte
/// block `big`, both allocated, and an empty free list.
fn isolated_pair() -> (Heap<VecSource>, HeapPtr, HeapPtr) {
    let mut heap = new_heap();
    let a = heap.allocate(24).unwrap();
    let big = heap.allocate(200).unwrap();
    let _filler = heap.allocate(776).unwrap();
    assert!(free_list(&heap).is_empty());
    (heap, a, big)
}

#[test]
fn isolated_small_goes_to_head() {
    let (mut heap, a, big) = isolated_pair();
    heap.free(Some(big));
    heap.free(Some(a));
    assert_eq!(free_list(&heap), [(12, 32), (828, 208)]);
    heap.validate().unwrap();
}

#[test]
fn isolated_large_goes_to_tail() {
    let (mut heap, a, big) = isolated_pair();
    heap.free(Some(a));
    heap.free(Some(big));
    assert_eq!(free_list(&heap), [(12, 32), (828, 208)]);
    heap.validate().unwrap();
}

#[test]
fn place_front_moves_leftover_to_tail() {
    let (mut heap, a, big) = isolated_pair();
    heap.free(Some(a));
    heap.free(Some(big));

    let ptr = heap.allocate(8).unwrap();
    assert_eq!(ptr.offset(), 16);
    assert_eq!(free_list(&heap), [(828, 208), (28, 16)]);
    heap.validate().unwrap();
}

#[test]
fn place_back_keeps_list_position() {
    let (mut heap, a, big) = isolated_pair();
    heap.free(Some(a));
    heap.free(Some(big));

    let ptr = heap.allocate(100).unwrap();
    assert_eq!(ptr.offset(), 928);
    assert_eq!(free_list(&heap), [(12, 32), (828, 96)]);
    heap.validate().unwrap();
}

#[test]
fn place_whole_block_when_remainder_is_small() {
    let (mut heap, a, big) = isolated_pair();
    heap.free(Some(a));
    heap.free(Some(big));

    let ptr = heap.allocate(16).unwrap();
    assert_eq!(ptr.offset(), 16);
    assert_eq!(heap.usable_size(ptr), 24);
    assert_eq!(free_list(&heap), [(828, 208)]);
    heap.validate().unwrap();
}

#[test]
fn size_rewrites() {
    let mut heap = new_heap();
    let p = heap.allocate(112).unwrap();
    assert_eq!(heap.usable_size(p), 128);
    let q = heap.allocate(448).unwrap();
    assert_eq!(heap.usable_size(q), 512);
    let r = heap.allocate(113).unwrap();
    assert_eq!(heap.usable_size(r), 120);
}

#[test]
fn custom_policy() {
    let _ = env_logger::builder().is_test(true).try_init();
    let policy = Policy {
        size_rewrites: &[],
        small_request_max: 0,
        initial_chunk: 256,
        ..Policy::DEFAULT
    };
    let mut heap = Heap::with_policy(VecSource::new(), policy);
    assert_eq!(heap.policy(), &policy);
    heap.init().unwrap();
    assert_eq!(free_list(&heap), [(12, 256)]);

    // Every split takes the back now
    let p = heap.allocate(8).unwrap();
    assert_eq!(p.offset(), 12 + 256 - 16 + 4);

    let q = heap.allocate(112).unwrap();
    assert_eq!(heap.usable_size(q), 112);
    heap.validate().unwrap();
}

#[test]
#[should_panic(expected = "must be a multiple")]
fn invalid_policy() {
    let _ = Heap::with_policy(
        VecSource::new(),
        Policy {
            initial_chunk: 100,
            ..Policy::DEFAULT
        },
    );
}

#[test]
fn allocate_zeroed() {
    let mut heap = new_heap();
    let p = heap.allocate(64).unwrap();
    heap.payload_mut(p).fill(0xff);
    heap.free(Some(p));

    let q = heap.allocate_zeroed(8, 8).unwrap();
    assert_eq!(q, p);
    assert!(heap.payload(q)[..64].iter().all(|&b| b == 0));
}

#[test]
fn payload_length_is_usable_size() {
    let mut heap = new_heap();
    let p = heap.allocate(1).unwrap();
    assert_eq!(heap.usable_size(p), 8);
    assert_eq!(heap.payload(p).len(), 8);
    assert_eq!(heap.payload_mut(p).len(), 8);
}

#[test]
fn stats_conserve_bytes() {
    let mut heap = new_heap();
    let ptrs: Vec<_> = [5, 100, 4000, 33, 700]
        .iter()
        .map(|&len| heap.allocate(len).unwrap())
        .collect();
    heap.free(Some(ptrs[1]));
    heap.free(Some(ptrs[3]));

    let stats = heap.validate().unwrap();
    assert_eq!(stats, heap.stats());
    assert_eq!(stats.used_blocks, 3);
    assert_eq!(stats.free_bytes + stats.used_bytes, stats.arena_len - 16);
    assert_eq!(
        stats.free_bytes,
        heap.free_blocks().map(|b| b.size).sum::<usize>()
    );
}

#[test]
#[should_panic(expected = "is not a live allocation")]
fn double_free() {
    let mut heap = new_heap();
    let ptr = heap.allocate(100).unwrap();
    heap.free(Some(ptr));
    heap.free(Some(ptr));
}

#[test]
#[should_panic(expected = "is not an allocation of this heap")]
fn foreign_pointer() {
    let mut other = new_heap();
    let ptr = other.allocate(4000).unwrap();

    let mut heap = new_heap();
    heap.free(Some(ptr));
}

#[test]
fn validate_detects_tag_mismatch() {
    let mut heap = new_heap();
    let ptr = heap.allocate(100).unwrap();
    assert_eq!(ptr.offset(), 928);

    write_word(heap.source_mut().arena_mut(), 1032, 0);
    assert_eq!(
        heap.validate(),
        Err(Corruption::TagMismatch {
            offset: 924,
            header: 112 | 1,
            footer: 0,
        })
    );
}

#[test]
fn validate_detects_uncoalesced_blocks() {
    let mut heap = new_heap();
    let ptr = heap.allocate(100).unwrap();

    // Mark the block free without going through `free`
    let arena = heap.source_mut().arena_mut();
    let block = Block::from_payload(ptr);
    block.set_header(arena, 112, false);
    block.set_footer(arena, 112, false);

    assert_eq!(heap.validate(), Err(Corruption::Uncoalesced { offset: 12 }));
}

#[test]
fn validate_detects_broken_sentinel() {
    let mut heap = new_heap();
    write_word(heap.source_mut().arena_mut(), 1036, 0);
    assert_eq!(
        heap.validate(),
        Err(Corruption::BadSentinel { offset: 1036 })
    );
}
