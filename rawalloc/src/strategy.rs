use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocError;

/// A source of raw memory blocks.
///
/// # Safety
///
/// Implementors must return blocks that are valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and that stay valid
/// until passed back to [`deallocate`](AllocStrategy::deallocate) (or until
/// the strategy itself is dropped or reset through `&mut`). Distinct live
/// blocks must not overlap.
pub unsafe trait AllocStrategy {
    /// Allocates a block described by `layout`.
    ///
    /// Zero-size layouts must succeed and may return a dangling, aligned
    /// pointer without touching the underlying memory source.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] when the request cannot be satisfied.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the strategy. Never fails.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this strategy with the same
    /// `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Allocates room for `count` values of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::LayoutOverflow`] if `count * size_of::<T>()`
    /// does not fit a layout, otherwise whatever `allocate` returns.
    fn allocate_array<T>(&self, count: usize) -> Result<NonNull<T>, AllocError>
    where
        Self: Sized,
    {
        let layout = array_layout::<T>(count)?;
        Ok(self.allocate(layout)?.cast())
    }

    /// Returns a block obtained from [`allocate_array`](AllocStrategy::allocate_array).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_array::<T>(count)` on this strategy.
    unsafe fn deallocate_array<T>(&self, ptr: NonNull<T>, count: usize)
    where
        Self: Sized,
    {
        // A block with this count was allocated, so the layout is valid.
        if let Ok(layout) = array_layout::<T>(count) {
            // SAFETY: forwarded from the caller.
            unsafe { self.deallocate(ptr.cast(), layout) }
        }
    }
}

// SAFETY: forwards to `A`, which upholds the contract.
unsafe impl<A: AllocStrategy + ?Sized> AllocStrategy for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

fn array_layout<T>(count: usize) -> Result<Layout, AllocError> {
    Layout::array::<T>(count).map_err(|_| AllocError::LayoutOverflow {
        count,
        elem_size: core::mem::size_of::<T>(),
    })
}

/// An aligned, non-null pointer for zero-size blocks.
pub(crate) fn dangling(layout: Layout) -> NonNull<u8> {
    // SAFETY: a layout's alignment is a non-zero power of two.
    unsafe { NonNull::new_unchecked(layout.align() as *mut u8) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heap;

    #[test]
    fn test_array_layout_overflow() {
        let err = Heap.allocate_array::<u64>(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            AllocError::LayoutOverflow {
                count: usize::MAX,
                elem_size: 8
            }
        );
    }

    #[test]
    fn test_dangling_is_aligned() {
        let layout = Layout::from_size_align(0, 64).unwrap();
        assert_eq!(dangling(layout).as_ptr() as usize % 64, 0);
    }

    #[test]
    fn test_reference_forwards() {
        let heap = Heap;
        let by_ref = &heap;
        let ptr = by_ref.allocate_array::<u32>(4).unwrap();
        unsafe {
            ptr.as_ptr().write(7);
            assert_eq!(ptr.as_ptr().read(), 7);
            by_ref.deallocate_array(ptr, 4);
        }
    }
}
