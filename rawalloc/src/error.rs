use thiserror::Error;

/// Error types for allocation strategies
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum AllocError {
    /// The global allocator could not satisfy the request
    #[error("Out of memory: the system allocator refused {size} bytes (align {align})")]
    OutOfMemory {
        /// Number of bytes requested
        size: usize,
        /// Alignment requested
        align: usize,
    },
    /// The arena region has no room left for the request
    #[error("Arena exhausted: requested {requested} bytes, but only {available} bytes available")]
    ArenaExhausted {
        /// Number of bytes requested, without alignment padding
        requested: usize,
        /// Number of bytes left in the arena
        available: usize,
    },
    /// The element count does not describe a valid memory layout
    #[error("Layout overflow: {count} elements of {elem_size} bytes exceed isize::MAX")]
    LayoutOverflow {
        /// Number of elements requested
        count: usize,
        /// Size of one element in bytes
        elem_size: usize,
    },
}
