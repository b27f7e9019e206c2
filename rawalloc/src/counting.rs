use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use crate::error::AllocError;
use crate::strategy::AllocStrategy;

/// Snapshot of the calls a [`Counting`] strategy has seen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful `allocate` calls
    pub allocations: usize,
    /// `deallocate` calls
    pub deallocations: usize,
    /// Total bytes handed out by successful `allocate` calls
    pub bytes_allocated: usize,
    /// Bytes allocated and not yet returned
    pub bytes_live: usize,
}

/// Wraps a strategy and counts the calls made through it.
///
/// Counters include zero-size requests, which never reach the inner
/// strategy's memory source but are still calls on the strategy.
#[derive(Debug, Default)]
pub struct Counting<A> {
    inner: A,
    stats: Cell<AllocStats>,
}

impl<A> Counting<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            stats: Cell::new(AllocStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    #[must_use]
    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

// SAFETY: forwards to `A`, which upholds the contract.
unsafe impl<A: AllocStrategy> AllocStrategy for Counting<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let block = self.inner.allocate(layout)?;
        let mut stats = self.stats.get();
        stats.allocations += 1;
        stats.bytes_allocated += layout.size();
        stats.bytes_live += layout.size();
        self.stats.set(stats);
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let mut stats = self.stats.get();
        stats.deallocations += 1;
        stats.bytes_live = stats.bytes_live.saturating_sub(layout.size());
        self.stats.set(stats);
        // SAFETY: forwarded from the caller.
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
