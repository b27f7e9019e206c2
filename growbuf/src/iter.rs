use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};
use core::slice;

use rawalloc::{AllocStrategy, Heap};

use crate::buf::{GrowBuf, ReleaseOnDrop};
use crate::relocate::Relocate;

/// Owning iterator over the elements of a [`GrowBuf`].
///
/// Elements not consumed are dropped with the iterator, which then returns
/// the region to the allocation strategy.
pub struct IntoIter<T: Relocate, A: AllocStrategy = Heap> {
    ptr: NonNull<T>,
    cap: usize,
    front: usize,
    back: usize,
    alloc: A,
    _owns: PhantomData<T>,
}

impl<T: Relocate, A: AllocStrategy> IntoIter<T, A> {
    /// The elements not yet yielded.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[front, back)` is live and inside the region.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(self.front), self.back - self.front) }
    }
}

impl<T: Relocate, A: AllocStrategy> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        // SAFETY: the slot is live and leaves `[front, back)` right after.
        let value = unsafe { ptr::read(self.ptr.as_ptr().add(self.front)) };
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T: Relocate, A: AllocStrategy> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        // SAFETY: the slot was live and is now outside `[front, back)`.
        Some(unsafe { ptr::read(self.ptr.as_ptr().add(self.back)) })
    }
}

impl<T: Relocate, A: AllocStrategy> ExactSizeIterator for IntoIter<T, A> {}

impl<T: Relocate, A: AllocStrategy> FusedIterator for IntoIter<T, A> {}

impl<T: Relocate, A: AllocStrategy> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        let rest = ptr::slice_from_raw_parts_mut(
            // SAFETY: `front <= cap`, so the offset stays in (or one past) the region.
            unsafe { self.ptr.as_ptr().add(self.front) },
            self.back - self.front,
        );
        self.front = self.back;
        let region = ReleaseOnDrop {
            ptr: self.ptr,
            cap: self.cap,
            alloc: &self.alloc,
        };
        // SAFETY: the remaining slots are live and no longer reachable.
        unsafe { ptr::drop_in_place(rest) };
        drop(region);
    }
}

impl<T: Relocate + fmt::Debug, A: AllocStrategy> fmt::Debug for IntoIter<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}

impl<T: Relocate, A: AllocStrategy> IntoIterator for GrowBuf<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        let buf = ManuallyDrop::new(self);
        IntoIter {
            ptr: buf.ptr,
            cap: buf.cap,
            front: 0,
            back: buf.len,
            // SAFETY: `buf` is never dropped, so the strategy is moved out once.
            alloc: unsafe { ptr::read(&buf.alloc) },
            _owns: PhantomData,
        }
    }
}

impl<'a, T: Relocate, A: AllocStrategy> IntoIterator for &'a GrowBuf<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Relocate, A: AllocStrategy> IntoIterator for &'a mut GrowBuf<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use crate::GrowBuf;
    use rawalloc::{Counting, Heap};
    use std::rc::Rc;
    use std::string::{String, ToString};
    use std::vec::Vec;

    fn words() -> GrowBuf<String> {
        let mut buf = GrowBuf::new();
        for word in ["alpha", "beta", "gamma", "delta"] {
            buf.push(word.to_string()).unwrap();
        }
        buf
    }

    #[test]
    fn test_owning_iteration_both_ends() {
        let mut iter = words().into_iter();

        assert_eq!(iter.len(), 4);
        assert_eq!(iter.next().as_deref(), Some("alpha"));
        assert_eq!(iter.next_back().as_deref(), Some("delta"));
        assert_eq!(iter.as_slice(), ["beta", "gamma"]);
        assert_eq!(iter.len(), 2);
    }

    #[test]
    fn test_partial_consumption_drops_rest() {
        let token = Rc::new(());
        let counting = Counting::new(Heap);
        let mut buf = GrowBuf::new_in(&counting);
        for _ in 0..5 {
            buf.push(Rc::clone(&token)).unwrap();
        }
        assert_eq!(Rc::strong_count(&token), 6);

        let mut iter = buf.into_iter();
        let first = iter.next();
        let last = iter.next_back();
        assert_eq!(iter.len(), 3);
        drop(iter);

        // Only the two yielded handles are still alive.
        assert_eq!(Rc::strong_count(&token), 3);
        assert_eq!(counting.stats().bytes_live, 0);
        assert_eq!(counting.stats().deallocations, counting.stats().allocations);

        drop((first, last));
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn test_unconsumed_iterator_releases_everything() {
        let token = Rc::new(());
        let counting = Counting::new(Heap);
        let mut buf = GrowBuf::new_in(&counting);
        buf.try_extend((0..4).map(|_| Rc::clone(&token))).unwrap();

        drop(buf.into_iter());

        assert_eq!(Rc::strong_count(&token), 1);
        assert_eq!(counting.stats().bytes_live, 0);
    }

    #[test]
    fn test_borrowed_iteration_is_restartable() {
        let buf = words();

        let first: Vec<&str> = (&buf).into_iter().map(String::as_str).collect();
        let second: Vec<&str> = buf.iter().map(String::as_str).collect();

        assert_eq!(first, second);
        assert_eq!(first, ["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn test_mutable_iteration() {
        let mut buf = words();
        for word in &mut buf {
            word.make_ascii_uppercase();
        }
        assert_eq!(buf.at(2).map(String::as_str), Some("GAMMA"));
    }
}
