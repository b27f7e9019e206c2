#![no_std]

//! `rawalloc`: pluggable sources of raw memory for containers.
//!
//! A container that separates storage from construction asks an
//! [`AllocStrategy`] for untyped blocks and constructs its values in them
//! itself. This crate provides the trait and three strategies:
//!
//! - [`Heap`]: delegates to the global allocator.
//! - [`Arena`]: bump allocation over a client-provided buffer. Nothing is
//!   returned to the system; the whole region is reclaimed when the arena is
//!   reset or dropped by its owner.
//! - [`Counting`]: wraps another strategy and records how it was used.
//!
//! Any `&A` where `A: AllocStrategy` is itself a strategy, so one arena can
//! back several containers:
//!
//! ```
//! use core::alloc::Layout;
//! use rawalloc::{AllocStrategy, Arena};
//!
//! let mut buffer = [0u8; 256];
//! let arena = Arena::new(&mut buffer);
//!
//! let first = (&arena).allocate(Layout::new::<u64>()).unwrap();
//! let second = (&arena).allocate(Layout::new::<u64>()).unwrap();
//! assert_ne!(first, second);
//! assert!(arena.used() >= 16);
//! ```
//!
//! # Performance Characteristics
//!
//! - `Arena::allocate`: O(1), a pointer bump plus alignment padding
//! - `Arena::deallocate`: no-op
//! - `Heap`: whatever the global allocator provides
//!
//! ## `no_std` Compatibility
//!
//! The crate only needs `core` and `alloc`. Enable the `std` feature to get
//! `std::error::Error` integration through `thiserror/std`.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod arena;
mod counting;
mod error;
mod heap;
mod strategy;

pub use arena::Arena;
pub use counting::{AllocStats, Counting};
pub use error::AllocError;
pub use heap::Heap;
pub use strategy::AllocStrategy;
