use alloc::alloc::{alloc, dealloc};
use core::alloc::Layout;
use core::ptr::NonNull;

use log::{trace, warn};

use crate::error::AllocError;
use crate::strategy::{dangling, AllocStrategy};

/// The general-purpose strategy: every block comes from the global allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Heap;

// SAFETY: blocks come straight from the global allocator with the requested
// layout and are returned to it with the same layout.
unsafe impl AllocStrategy for Heap {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc(layout) };
        let Some(block) = NonNull::new(raw) else {
            warn!(
                "heap: refused {} bytes (align {})",
                layout.size(),
                layout.align()
            );
            return Err(AllocError::OutOfMemory {
                size: layout.size(),
                align: layout.align(),
            });
        };
        trace!(
            "heap: allocated {} bytes (align {}) at {:p}",
            layout.size(),
            layout.align(),
            block
        );
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        trace!("heap: released {} bytes at {:p}", layout.size(), ptr);
        // SAFETY: the caller guarantees `ptr` came from `allocate(layout)`.
        unsafe { dealloc(ptr.as_ptr(), layout) }
    }
}
