use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use rawalloc::{AllocStrategy, Heap};

use crate::error::{ElementError, GrowBufError};

/// A single value owned in a block from an allocation strategy.
///
/// The one-element counterpart of [`GrowBuf`](crate::GrowBuf): the block is
/// requested first, the value is constructed into it, and a failed
/// construction returns the block before reporting the error.
pub struct AllocBox<T, A: AllocStrategy = Heap> {
    ptr: NonNull<T>,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: the box owns its value exclusively.
unsafe impl<T: Send, A: AllocStrategy + Send> Send for AllocBox<T, A> {}
// SAFETY: shared access only hands out `&T` and `&A`.
unsafe impl<T: Sync, A: AllocStrategy + Sync> Sync for AllocBox<T, A> {}

impl<T> AllocBox<T> {
    /// Places `value` in a heap block.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the block cannot be allocated.
    pub fn new(value: T) -> Result<Self, GrowBufError> {
        Self::new_in(value, Heap)
    }
}

impl<T, A: AllocStrategy> AllocBox<T, A> {
    /// Places `value` in a block from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the block cannot be allocated.
    pub fn new_in(value: T, alloc: A) -> Result<Self, GrowBufError> {
        Self::try_new_with_in(|| Ok(value), alloc)
    }

    /// Constructs a default value in a block from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the block cannot be allocated.
    pub fn default_in(alloc: A) -> Result<Self, GrowBufError>
    where
        T: Default,
    {
        Self::try_new_with_in(|| Ok(T::default()), alloc)
    }

    /// Requests a block from `alloc`, then constructs the value with `f`.
    ///
    /// If `f` fails or panics, the block is returned to `alloc`.
    ///
    /// # Errors
    ///
    /// - `GrowBufError::Alloc` if the block cannot be allocated
    /// - `GrowBufError::Construct` if `f` fails
    pub fn try_new_with_in<F>(f: F, alloc: A) -> Result<Self, GrowBufError>
    where
        F: FnOnce() -> Result<T, ElementError>,
    {
        let ptr = alloc.allocate_array::<T>(1)?;
        let block = Unfilled {
            ptr,
            alloc: &alloc,
        };
        let value = f().map_err(|source| GrowBufError::Construct { index: 0, source })?;
        mem::forget(block);

        // SAFETY: the block is fresh and sized for one `T`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self {
            ptr,
            alloc,
            _owns: PhantomData,
        })
    }

    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Moves the value out and returns the block to the strategy.
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the value and the strategy are
        // each moved out exactly once.
        unsafe {
            let value = ptr::read(this.ptr.as_ptr());
            let alloc = ptr::read(&this.alloc);
            alloc.deallocate_array(this.ptr, 1);
            value
        }
    }
}

/// Returns a block whose value was never constructed.
struct Unfilled<'a, T, A: AllocStrategy> {
    ptr: NonNull<T>,
    alloc: &'a A,
}

impl<T, A: AllocStrategy> Drop for Unfilled<'_, T, A> {
    fn drop(&mut self) {
        // SAFETY: the block came from `allocate_array::<T>(1)` and holds no value.
        unsafe { self.alloc.deallocate_array(self.ptr, 1) }
    }
}

impl<T, A: AllocStrategy> Drop for AllocBox<T, A> {
    fn drop(&mut self) {
        // SAFETY: the value is live and the block came from `alloc`.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.alloc.deallocate_array(self.ptr, 1);
        }
    }
}

impl<T, A: AllocStrategy> Deref for AllocBox<T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value is live for as long as the box.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, A: AllocStrategy> DerefMut for AllocBox<T, A> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`, and `&mut self` makes the borrow unique.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug, A: AllocStrategy> fmt::Debug for AllocBox<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
