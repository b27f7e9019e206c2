use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};
use core::slice;

use log::{debug, trace, warn};
use rawalloc::{AllocStrategy, Heap};

use crate::error::{ElementError, GrowBufError};
use crate::relocate::Relocate;

/// Capacity multiplier applied when a push finds the buffer full.
pub const GROWTH_FACTOR: usize = 2;
/// Capacity of the first region a push allocates.
pub const MIN_NON_ZERO_CAP: usize = 1;
/// Element size from which growth is reported on the large-element path.
pub const LARGE_ELEMENT_BYTES: usize = 4096;

/// A growable, contiguous, move-only buffer.
///
/// Slots `[0, len)` hold live values and `[len, capacity)` is allocated but
/// uninitialized. The region comes from the allocation strategy `A` and is
/// owned exclusively by the buffer; growth moves every element to a fresh
/// region and returns the old one.
///
/// `GrowBuf` has no `Clone`:
///
/// ```compile_fail
/// use growbuf::GrowBuf;
///
/// let buf: GrowBuf<u32> = GrowBuf::new();
/// let copy = buf.clone();
/// ```
pub struct GrowBuf<T: Relocate, A: AllocStrategy = Heap> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) len: usize,
    pub(crate) cap: usize,
    pub(crate) alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: the buffer owns its elements and its region exclusively.
unsafe impl<T: Relocate + Send, A: AllocStrategy + Send> Send for GrowBuf<T, A> {}
// SAFETY: shared access only hands out `&T` and `&A`.
unsafe impl<T: Relocate + Sync, A: AllocStrategy + Sync> Sync for GrowBuf<T, A> {}

impl<T: Relocate> GrowBuf<T> {
    /// Creates an empty heap-backed buffer. Does not allocate.
    #[must_use]
    pub const fn new() -> Self {
        Self::new_in(Heap)
    }

    /// Creates a heap-backed buffer of `len` default values.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the region cannot be allocated.
    pub fn with_len(len: usize) -> Result<Self, GrowBufError>
    where
        T: Default,
    {
        Self::with_len_in(len, Heap)
    }

    /// Creates an empty heap-backed buffer with room for `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the region cannot be allocated.
    pub fn with_capacity(capacity: usize) -> Result<Self, GrowBufError> {
        Self::with_capacity_in(capacity, Heap)
    }
}

impl<T: Relocate, A: AllocStrategy> GrowBuf<T, A> {
    /// Creates an empty buffer bound to `alloc`. Does not call the strategy.
    #[must_use]
    pub const fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Creates an empty buffer with room for exactly `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the strategy cannot provide the region.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, GrowBufError> {
        let mut buf = Self::new_in(alloc);
        buf.reserve(capacity)?;
        Ok(buf)
    }

    /// Creates a buffer of `len` default values, with `capacity == len`.
    ///
    /// # Errors
    ///
    /// Returns `GrowBufError::Alloc` if the strategy cannot provide the region.
    pub fn with_len_in(len: usize, alloc: A) -> Result<Self, GrowBufError>
    where
        T: Default,
    {
        Self::try_from_fn_in(len, alloc, |_| Ok(T::default()))
    }

    /// Creates a buffer of `len` values built by `f(index)`, with
    /// `capacity == len`.
    ///
    /// If `f` fails for index `k`, the values `[0, k)` are dropped in reverse
    /// order and the region is released before the error is returned.
    ///
    /// # Errors
    ///
    /// - `GrowBufError::Alloc` if the strategy cannot provide the region
    /// - `GrowBufError::Construct` if `f` fails
    pub fn try_from_fn_in<F>(len: usize, alloc: A, mut f: F) -> Result<Self, GrowBufError>
    where
        F: FnMut(usize) -> Result<T, ElementError>,
    {
        let mut buf = Self::with_capacity_in(len, alloc)?;
        for index in 0..len {
            match f(index) {
                Ok(value) => {
                    // SAFETY: `index < len == capacity` and the slot is unused.
                    unsafe { buf.write_unchecked(value) };
                }
                Err(source) => {
                    warn!(
                        "growbuf: construction of element {} of {} failed: {}",
                        index, len, source
                    );
                    buf.unwind();
                    return Err(GrowBufError::Construct { index, source });
                }
            }
        }
        Ok(buf)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Pointer to the first slot, or null when no region is owned.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        if self.cap == 0 {
            ptr::null()
        } else {
            self.ptr.as_ptr()
        }
    }

    /// Mutable pointer to the first slot, or null when no region is owned.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        if self.cap == 0 {
            ptr::null_mut()
        } else {
            self.ptr.as_ptr()
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is aligned and non-null, and `[0, len)` is live.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`, and `&mut self` makes the borrow unique.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the element at `index`, or `None` when `index >= len`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Returns the element at `index` mutably, or `None` when `index >= len`.
    #[must_use]
    pub fn at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Grows the region to hold at least `new_capacity` values.
    ///
    /// Never shrinks: a request at or below the current capacity does
    /// nothing. When `T::MAY_FAIL`, every live element is asked through
    /// [`Relocate::try_relocate`] before anything moves; a refusal leaves the
    /// buffer exactly as it was.
    ///
    /// # Errors
    ///
    /// - `GrowBufError::Alloc` if the strategy cannot provide the region
    /// - `GrowBufError::Relocate` if an element refuses to move
    pub fn reserve(&mut self, new_capacity: usize) -> Result<(), GrowBufError> {
        if new_capacity <= self.cap {
            return Ok(());
        }
        self.log_growth(new_capacity);

        if T::MAY_FAIL {
            if let Err((index, source)) = self.vet_relocation() {
                warn!(
                    "growbuf: element {} refused relocation ({}), keeping {} slots",
                    index, source, self.cap
                );
                return Err(GrowBufError::Relocate { index, source });
            }
        }

        let region = self.alloc.allocate_array::<T>(new_capacity)?;
        if self.cap > 0 {
            // SAFETY: the regions are distinct allocations of at least `len`
            // slots. The bitwise copy transfers ownership of the live values,
            // so the old region is released without dropping them.
            unsafe {
                ptr::copy_nonoverlapping(self.ptr.as_ptr(), region.as_ptr(), self.len);
                self.alloc.deallocate_array(self.ptr, self.cap);
            }
        }
        self.ptr = region;
        self.cap = new_capacity;
        Ok(())
    }

    /// Appends `value`, doubling the capacity when the buffer is full.
    ///
    /// On failure the buffer is unchanged and `value` is dropped.
    ///
    /// # Errors
    ///
    /// Growth errors from [`reserve`](GrowBuf::reserve), or
    /// `GrowBufError::CapacityOverflow` if the doubled capacity overflows.
    pub fn push(&mut self, value: T) -> Result<(), GrowBufError> {
        self.grow_for_push()?;
        // SAFETY: `grow_for_push` guarantees `len < capacity`.
        unsafe { self.write_unchecked(value) };
        Ok(())
    }

    /// Appends the value returned by `f` and returns a reference to it.
    ///
    /// # Errors
    ///
    /// As for [`push`](GrowBuf::push).
    pub fn emplace_with<F>(&mut self, f: F) -> Result<&mut T, GrowBufError>
    where
        F: FnOnce() -> T,
    {
        self.try_emplace_with(|| Ok(f()))
    }

    /// Appends the value built by the fallible constructor `f`.
    ///
    /// `f` runs before any growth, so a construction failure leaves both
    /// length and capacity unchanged.
    ///
    /// # Errors
    ///
    /// `GrowBufError::Construct` if `f` fails, otherwise as for
    /// [`push`](GrowBuf::push).
    pub fn try_emplace_with<F>(&mut self, f: F) -> Result<&mut T, GrowBufError>
    where
        F: FnOnce() -> Result<T, ElementError>,
    {
        let index = self.len;
        let value = f().map_err(|source| GrowBufError::Construct { index, source })?;
        self.grow_for_push()?;
        // SAFETY: `grow_for_push` guarantees `len < capacity`.
        Ok(unsafe { self.write_unchecked(value) })
    }

    /// Appends every value of `iter`.
    ///
    /// Growth is amortized as for [`push`](GrowBuf::push), so repeated calls
    /// with short iterators stay linear overall. Values pushed before a
    /// failure stay in the buffer.
    ///
    /// # Errors
    ///
    /// As for [`push`](GrowBuf::push).
    pub fn try_extend<I>(&mut self, iter: I) -> Result<(), GrowBufError>
    where
        I: IntoIterator<Item = T>,
    {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.grow_amortized(lower)?;
        for value in iter {
            self.push(value)?;
        }
        Ok(())
    }

    /// Removes and returns the last element, or `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot was live and is now outside `[0, len)`.
        Some(unsafe { ptr::read(self.ptr.as_ptr().add(self.len)) })
    }

    /// Drops every element, keeping the region.
    pub fn clear(&mut self) {
        let live = ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // Reset first so a panicking destructor cannot cause a double drop.
        self.len = 0;
        // SAFETY: the slots were live and are no longer reachable.
        unsafe { ptr::drop_in_place(live) }
    }

    /// Moves the contents out, leaving `self` empty with no region.
    ///
    /// The strategy is cloned into the emptied buffer so it stays usable.
    /// Neither buffer calls the strategy.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let emptied = Self::new_in(self.alloc.clone());
        mem::replace(self, emptied)
    }

    /// Writes `value` at `len` and returns it.
    ///
    /// # Safety
    ///
    /// `len < capacity`.
    unsafe fn write_unchecked(&mut self, value: T) -> &mut T {
        debug_assert!(self.len < self.cap);
        // SAFETY: the slot is inside the region and not live.
        unsafe {
            let slot = self.ptr.as_ptr().add(self.len);
            slot.write(value);
            self.len += 1;
            &mut *slot
        }
    }

    fn grow_for_push(&mut self) -> Result<(), GrowBufError> {
        self.grow_amortized(1)
    }

    /// Makes room for `additional` more values, at least doubling the
    /// capacity whenever it grows.
    fn grow_amortized(&mut self, additional: usize) -> Result<(), GrowBufError> {
        let cap = self.cap;
        let overflow = || GrowBufError::CapacityOverflow { capacity: cap };
        let required = self.len.checked_add(additional).ok_or_else(overflow)?;
        if required <= self.cap {
            return Ok(());
        }
        let new_capacity = self
            .cap
            .checked_mul(GROWTH_FACTOR)
            .ok_or_else(overflow)?
            .max(required)
            .max(MIN_NON_ZERO_CAP);
        trace!(
            "growbuf: {} elements need {} slots, growing to {}",
            self.len,
            required,
            new_capacity
        );
        self.reserve(new_capacity)
    }

    fn vet_relocation(&self) -> Result<(), (usize, ElementError)> {
        self.iter()
            .enumerate()
            .try_for_each(|(index, value)| value.try_relocate().map_err(|e| (index, e)))
    }

    /// Drops the live values from the last to the first.
    fn unwind(&mut self) {
        while let Some(value) = self.pop() {
            drop(value);
        }
    }

    fn log_growth(&self, new_capacity: usize) {
        let elem_size = mem::size_of::<T>();
        if elem_size >= LARGE_ELEMENT_BYTES {
            debug!(
                "growbuf: large-element path for {} ({} bytes), {} -> {} slots",
                core::any::type_name::<T>(),
                elem_size,
                self.cap,
                new_capacity
            );
        } else if self.cap == 0 {
            debug!(
                "growbuf: first region for {}, {} slots",
                core::any::type_name::<T>(),
                new_capacity
            );
        } else {
            debug!(
                "growbuf: reallocating {}, {} -> {} slots, moving {} elements",
                core::any::type_name::<T>(),
                self.cap,
                new_capacity,
                self.len
            );
        }
        if T::MAY_FAIL {
            debug!("growbuf: relocation may fail, vetting {} elements", self.len);
        }
    }
}

impl<T: Relocate, A: AllocStrategy> Drop for GrowBuf<T, A> {
    fn drop(&mut self) {
        let region = ReleaseOnDrop {
            ptr: self.ptr,
            cap: self.cap,
            alloc: &self.alloc,
        };
        let live = ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // SAFETY: the slots are live and the buffer is never used again. If a
        // destructor panics, the rest are still dropped and `region` still
        // returns the memory while unwinding.
        unsafe { ptr::drop_in_place(live) };
        drop(region);
    }
}

/// Returns a region of `cap` slots to `alloc` when dropped.
pub(crate) struct ReleaseOnDrop<'a, T, A: AllocStrategy> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) cap: usize,
    pub(crate) alloc: &'a A,
}

impl<T, A: AllocStrategy> Drop for ReleaseOnDrop<'_, T, A> {
    fn drop(&mut self) {
        if self.cap > 0 {
            // SAFETY: the region was allocated with `cap` slots by `alloc` and
            // holds no live values by now.
            unsafe { self.alloc.deallocate_array(self.ptr, self.cap) }
        }
    }
}

impl<T: Relocate, A: AllocStrategy + Default> Default for GrowBuf<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: Relocate, A: AllocStrategy> Deref for GrowBuf<T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Relocate, A: AllocStrategy> DerefMut for GrowBuf<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Relocate + fmt::Debug, A: AllocStrategy> fmt::Debug for GrowBuf<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawalloc::{Arena, Counting};
    use std::string::String;

    #[test]
    fn test_default_is_empty() {
        let buf: GrowBuf<i32> = GrowBuf::new();

        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 0);
        assert!(buf.as_ptr().is_null());
    }

    #[test]
    fn test_new_in_does_not_allocate() {
        let counting = Counting::new(Heap);
        let buf: GrowBuf<u64, _> = GrowBuf::new_in(&counting);

        assert_eq!(buf.capacity(), 0);
        assert_eq!(counting.stats().allocations, 0);
    }

    #[test]
    fn test_with_len_default_values() {
        let buf: GrowBuf<i32> = GrowBuf::with_len(5).unwrap();

        assert_eq!(buf.len(), 5);
        assert_eq!(buf.capacity(), 5);
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_with_len_zero_owns_no_region() {
        let buf: GrowBuf<String> = GrowBuf::with_len(0).unwrap();

        assert_eq!(buf.capacity(), 0);
        assert!(buf.as_ptr().is_null());
    }

    #[test]
    fn test_push_doubles_capacity() {
        let mut buf = GrowBuf::new();
        let mut seen = std::vec::Vec::new();

        for i in 0..9u32 {
            buf.push(i).unwrap();
            seen.push(buf.capacity());
        }

        assert_eq!(seen, [1, 2, 4, 4, 8, 8, 8, 8, 16]);
    }

    #[test]
    fn test_reserve_exact_then_noop() {
        let mut buf: GrowBuf<u8> = GrowBuf::new();

        buf.reserve(10).unwrap();
        let region = buf.as_ptr();
        buf.reserve(3).unwrap();
        buf.reserve(10).unwrap();

        assert_eq!(buf.capacity(), 10);
        assert_eq!(buf.as_ptr(), region);
    }

    #[test]
    fn test_emplace_returns_new_element() {
        let mut buf: GrowBuf<String> = GrowBuf::new();

        let slot = buf.emplace_with(|| String::from("abc")).unwrap();
        slot.push('d');

        assert_eq!(buf.at(0).map(String::as_str), Some("abcd"));
    }

    #[test]
    fn test_construct_failure_keeps_capacity() {
        let mut buf: GrowBuf<u32> = GrowBuf::with_capacity(1).unwrap();
        buf.push(1).unwrap();

        let err = buf
            .try_emplace_with(|| Err(ElementError::new("no")))
            .unwrap_err();

        assert_eq!(
            err,
            GrowBufError::Construct {
                index: 1,
                source: ElementError::new("no")
            }
        );
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn test_capacity_overflow() {
        let mut buf: GrowBuf<()> = GrowBuf::new();
        buf.reserve(usize::MAX).unwrap();
        buf.len = usize::MAX;

        assert_eq!(
            buf.push(()).unwrap_err(),
            GrowBufError::CapacityOverflow {
                capacity: usize::MAX
            }
        );
        buf.len = 0;
    }

    #[test]
    fn test_arena_exhaustion_leaves_buffer_intact() {
        let mut backing = [0u8; 24];
        let arena = Arena::new(&mut backing);
        let mut buf = GrowBuf::new_in(&arena);

        // Regions of 1 and 2 slots take at most 15 bytes with padding;
        // a region of 4 slots needs 16 more.
        buf.push(0u32).unwrap();
        buf.push(1).unwrap();
        let err = buf.push(2).unwrap_err();

        assert!(matches!(
            err,
            GrowBufError::Alloc(rawalloc::AllocError::ArenaExhausted { .. })
        ));
        assert_eq!(buf.as_slice(), &[0, 1]);
        assert_eq!(buf.capacity(), 2);
    }

    #[test]
    fn test_repeated_extend_grows_like_push() {
        let extended = Counting::new(Heap);
        let pushed = Counting::new(Heap);
        let mut by_extend: GrowBuf<u32, _> = GrowBuf::new_in(&extended);
        let mut by_push: GrowBuf<u32, _> = GrowBuf::new_in(&pushed);

        for i in 0..1000 {
            by_extend.try_extend(core::iter::once(i)).unwrap();
            by_push.push(i).unwrap();
        }

        // Capacities 1, 2, 4, ..., 1024.
        assert_eq!(extended.stats().allocations, 11);
        assert_eq!(extended.stats(), pushed.stats());
        assert_eq!(by_extend.capacity(), by_push.capacity());
        assert_eq!(by_extend.as_slice(), by_push.as_slice());
    }

    #[test]
    fn test_extend_reserves_at_least_the_size_hint() {
        let mut buf: GrowBuf<u32> = GrowBuf::new();
        buf.push(0).unwrap();

        buf.try_extend(1..=9).unwrap();
        assert_eq!(buf.capacity(), 10);

        buf.try_extend(10..12).unwrap();
        assert_eq!(buf.capacity(), 20);
    }
}
