use core::{ptr::NonNull, slice};

use super::HeapSource;
use crate::{block::MAX_ARENA_LEN, utils::align_up};

/// A [`HeapSource`] that reserves an anonymous memory mapping up front and
/// moves a break through it.
///
/// Pages are committed lazily by the kernel as the break advances, so a
/// generous capacity costs address space, not memory. The mapping is
/// released when the source is dropped.
#[derive(Debug)]
pub struct MmapSource {
    base: NonNull<u8>,
    capacity: usize,
    brk: usize,
}

// Safety: The mapping is exclusively owned by `MmapSource` and is only
//         reachable through `&self`/`&mut self`.
unsafe impl Send for MmapSource {}
unsafe impl Sync for MmapSource {}

#[inline]
fn page_size() -> usize {
    // Safety: `sysconf` has no preconditions
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

impl MmapSource {
    /// Reserve at least `capacity` bytes of address space.
    ///
    /// Returns `None` if `capacity` is zero or the mapping cannot be
    /// created.
    pub fn new(capacity: usize) -> Option<Self> {
        let page_size = page_size();
        if capacity == 0 || !page_size.is_power_of_two() {
            return None;
        }
        let capacity = align_up(capacity.min(MAX_ARENA_LEN), page_size)?;

        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                capacity,
                libc::PROT_WRITE | libc::PROT_READ,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            log::debug!("MmapSource: mmap({}) failed", capacity);
            return None;
        }

        Some(Self {
            base: NonNull::new(ptr as *mut u8)?,
            capacity,
            brk: 0,
        })
    }

    /// The number of bytes reserved.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl HeapSource for MmapSource {
    fn grow(&mut self, increment: usize) -> Option<usize> {
        let new_brk = self.brk.checked_add(increment)?;
        if new_brk > self.capacity || new_brk > MAX_ARENA_LEN {
            return None;
        }
        let old_brk = self.brk;
        self.brk = new_brk;
        Some(old_brk)
    }

    #[inline]
    fn arena(&self) -> &[u8] {
        // Safety: `base..base + brk` lies within our private, readable and
        //         writable mapping. Anonymous mappings are zero-filled, so
        //         the bytes are initialized.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
    }

    #[inline]
    fn arena_mut(&mut self) -> &mut [u8] {
        // Safety: See `arena`. `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
    }
}

impl Drop for MmapSource {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.capacity) };
    }
}
