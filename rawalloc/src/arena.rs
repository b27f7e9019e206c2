use core::alloc::Layout;
use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use log::{trace, warn};

use crate::error::AllocError;
use crate::strategy::{dangling, AllocStrategy};

/// A monotonic bump allocator over a client-provided buffer.
///
/// Buffer layout: `[allocated blocks + alignment padding][free space]`. The
/// cursor only moves forward; [`deallocate`](AllocStrategy::deallocate) is a
/// no-op and the space comes back only through [`reset`](Arena::reset) or
/// by dropping the arena and reusing the buffer.
///
/// The cursor lives in a `Cell`, so an arena is `!Sync`: containers sharing
/// one arena through `&Arena` stay on one thread.
pub struct Arena<'buf> {
    start: NonNull<u8>,
    len: usize,
    cursor: Cell<usize>,
    _buffer: PhantomData<&'buf mut [u8]>,
}

impl<'buf> Arena<'buf> {
    /// Creates an arena that hands out blocks from `buffer`.
    ///
    /// An empty buffer is accepted; every non-zero request then fails with
    /// [`AllocError::ArenaExhausted`].
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self {
            len: buffer.len(),
            start: NonNull::from(buffer).cast(),
            cursor: Cell::new(0),
            _buffer: PhantomData,
        }
    }

    /// Size of the backing region in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Bytes handed out so far, including alignment padding.
    #[must_use]
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.len - self.cursor.get()
    }

    /// Rewinds the cursor to the start of the region.
    ///
    /// Taking `&mut self` guarantees that no container still borrows the
    /// arena, so no live block can be handed out twice.
    pub fn reset(&mut self) {
        trace!("arena: reset after {} bytes", self.cursor.get());
        self.cursor.set(0);
    }
}

// SAFETY: every block lies inside the borrowed region, and the cursor only
// moves forward until `reset(&mut self)`, so live blocks never overlap.
unsafe impl AllocStrategy for Arena<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }

        let cursor = self.cursor.get();
        let available = self.len - cursor;
        let address = (self.start.as_ptr() as usize).wrapping_add(cursor);
        let padding = address.wrapping_neg() & (layout.align() - 1);

        let end = cursor
            .checked_add(padding)
            .and_then(|offset| offset.checked_add(layout.size()))
            .filter(|&end| end <= self.len);
        let Some(end) = end else {
            warn!(
                "arena: exhausted, requested {} bytes with {} bytes available",
                layout.size(),
                available
            );
            return Err(AllocError::ArenaExhausted {
                requested: layout.size(),
                available,
            });
        };

        self.cursor.set(end);
        // SAFETY: `cursor + padding < end <= len`, so the offset stays inside
        // the region and the resulting pointer is non-null.
        let block = unsafe { NonNull::new_unchecked(self.start.as_ptr().add(cursor + padding)) };
        trace!(
            "arena: bumped {} bytes (+{} padding), {} of {} used",
            layout.size(),
            padding,
            end,
            self.len
        );
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        trace!(
            "arena: ignoring release of {} bytes at {:p}",
            layout.size(),
            ptr
        );
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.len)
            .field("used", &self.cursor.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_initialization() {
        let mut buffer = [0u8; 100];
        let arena = Arena::new(&mut buffer);

        assert_eq!(arena.capacity(), 100);
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.available(), 100);
    }

    #[test]
    fn test_sequential_blocks_dont_overlap() {
        let mut buffer = [0u8; 64];
        let arena = Arena::new(&mut buffer);

        let a = arena.allocate(Layout::new::<[u8; 5]>()).unwrap();
        let b = arena.allocate(Layout::new::<[u8; 3]>()).unwrap();

        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 5);
        assert_eq!(arena.used(), 8);
    }

    #[test]
    fn test_alignment_padding_counts_as_used() {
        let mut buffer = [0u8; 64];
        let arena = Arena::new(&mut buffer);

        arena.allocate(Layout::new::<u8>()).unwrap();
        let word = arena.allocate(Layout::new::<u64>()).unwrap();

        assert_eq!(word.as_ptr() as usize % core::mem::align_of::<u64>(), 0);
        assert!(arena.used() >= 9);
        assert!(arena.used() <= 1 + 7 + 8);
    }

    #[test]
    fn test_exhaustion() {
        let mut buffer = [0u8; 16];
        let arena = Arena::new(&mut buffer);

        arena.allocate(Layout::new::<[u8; 12]>()).unwrap();
        let err = arena.allocate(Layout::new::<[u8; 8]>()).unwrap_err();

        assert_eq!(
            err,
            AllocError::ArenaExhausted {
                requested: 8,
                available: 4
            }
        );
        // A failed request does not move the cursor.
        assert_eq!(arena.used(), 12);
        assert!(arena.allocate(Layout::new::<[u8; 4]>()).is_ok());
    }

    #[test]
    fn test_empty_buffer() {
        let mut buffer = [0u8; 0];
        let arena = Arena::new(&mut buffer);

        assert!(arena.allocate(Layout::new::<u8>()).is_err());
        assert!(arena.allocate(Layout::new::<()>()).is_ok());
    }

    #[test]
    fn test_deallocate_is_noop() {
        #[repr(align(4))]
        struct Aligned([u8; 32]);

        let mut buffer = Aligned([0u8; 32]);
        let arena = Arena::new(&mut buffer.0);

        let layout = Layout::new::<u32>();
        let block = arena.allocate(layout).unwrap();
        unsafe { arena.deallocate(block, layout) };

        assert_eq!(arena.used(), 4);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut buffer = [0u8; 32];
        let mut arena = Arena::new(&mut buffer);

        let first = arena.allocate(Layout::new::<u32>()).unwrap();
        arena.reset();
        assert_eq!(arena.used(), 0);

        let again = arena.allocate(Layout::new::<u32>()).unwrap();
        assert_eq!(first, again);
    }
}
