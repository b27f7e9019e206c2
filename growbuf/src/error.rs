use rawalloc::AllocError;
use thiserror::Error;

/// Failure reported by an element while it is constructed or relocated.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("{reason}")]
pub struct ElementError {
    reason: &'static str,
}

impl ElementError {
    #[must_use]
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// Error types for `GrowBuf` operations
///
/// Out-of-range access and popping an empty buffer are not errors; those
/// return `None`.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum GrowBufError {
    /// The allocation strategy could not provide a region
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The requested capacity cannot be represented
    #[error("Capacity overflow: cannot grow beyond {capacity} elements")]
    CapacityOverflow {
        /// Capacity at the time of the request
        capacity: usize,
    },
    /// An element refused to move to the new region
    #[error("Relocation failed at index {index}: {source}")]
    Relocate {
        /// Index of the element that refused
        index: usize,
        /// Reason given by the element
        source: ElementError,
    },
    /// Constructing an element failed
    #[error("Construction failed at index {index}: {source}")]
    Construct {
        /// Index the element would have occupied
        index: usize,
        /// Reason given by the constructor
        source: ElementError,
    },
}
