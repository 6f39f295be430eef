use std::marker::PhantomData;
use std::ops::Range;

/// Mutable slice shared between parallel workers that write to
/// disjoint index ranges.
///
/// Safety: callers of the accessors must guarantee that no index is
/// written by one worker while it is read or written by another.  In
/// the factorization this holds because each column is written only
/// by the worker that claimed it, and read by others only after its
/// state has been published as ready with release ordering.
pub(crate) struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'a, T: Copy> SharedSlice<'a, T> {
    pub(crate) fn new(data: &'a mut [T]) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            _marker: PhantomData,
        }
    }

    pub(crate) unsafe fn get(&self, idx: usize) -> T {
        debug_assert!(idx < self.len);
        *self.ptr.add(idx)
    }

    pub(crate) unsafe fn set(&self, idx: usize, value: T) {
        debug_assert!(idx < self.len);
        *self.ptr.add(idx) = value;
    }

    pub(crate) unsafe fn slice(&self, rng: Range<usize>) -> &[T] {
        debug_assert!(rng.start <= rng.end && rng.end <= self.len);
        std::slice::from_raw_parts(self.ptr.add(rng.start), rng.end - rng.start)
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, rng: Range<usize>) -> &mut [T] {
        debug_assert!(rng.start <= rng.end && rng.end <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(rng.start), rng.end - rng.start)
    }
}
