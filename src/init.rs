/// Provides a constant default value.
///
/// Implemented for every type that implements
/// [`ConstDefault`](const_default1::ConstDefault), so that
/// `Heap<ArraySource<N>>` can be placed in a `static`.
pub trait Init {
    /// `Self`'s default value.
    const INIT: Self;
}

impl<T: const_default1::ConstDefault> Init for T {
    const INIT: Self = T::DEFAULT;
}
