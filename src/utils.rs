/// Round `x` up to a multiple of `align`, which must be a power of two.
/// Returns `None` on overflow.
#[inline]
pub fn align_up(x: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(x.checked_add(align - 1)? & !(align - 1))
}

/// The number of bytes needed after `x` to reach the next multiple of
/// `align`, which must be a power of two.
#[inline]
pub fn align_padding(x: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    x.wrapping_neg() & (align - 1)
}
