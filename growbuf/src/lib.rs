#![no_std]

//! `GrowBuf`: a growable, contiguous, move-only buffer over a pluggable
//! allocation strategy.
//!
//! The buffer owns one region of `capacity` slots, of which the first `len`
//! hold live values. Raw memory comes from an [`AllocStrategy`]: the global
//! heap by default, or an [`Arena`] over a client-provided buffer.
//!
//! ```
//! use growbuf::GrowBuf;
//!
//! let mut buf = GrowBuf::new();
//! buf.push(String::from("hello")).unwrap();
//! buf.push(String::from("world")).unwrap();
//!
//! assert_eq!(buf.len(), 2);
//! assert_eq!(buf.at(0).map(String::as_str), Some("hello"));
//! assert_eq!(buf.at(2), None);
//!
//! assert_eq!(buf.pop().as_deref(), Some("world"));
//! ```
//!
//! # Allocation Strategies
//!
//! Any strategy can back a buffer. An arena hands out bump-allocated blocks
//! and never returns them, which suits short-lived, bounded workloads:
//!
//! ```
//! use growbuf::{Arena, GrowBuf};
//!
//! let mut backing = [0u8; 1024];
//! let arena = Arena::new(&mut backing);
//!
//! let mut small = GrowBuf::new_in(&arena);
//! for i in 0..16u32 {
//!     small.push(i).unwrap();
//! }
//! assert_eq!(small.iter().sum::<u32>(), 120);
//! assert!(arena.used() > 0);
//! ```
//!
//! # Move-Only Elements
//!
//! Elements must implement [`Relocate`]. The buffer never duplicates them and
//! is not `Clone` itself. Types whose relocation can be refused set
//! [`Relocate::MAY_FAIL`]; growth then asks every element first and leaves the
//! buffer untouched on a refusal:
//!
//! ```
//! use growbuf::{ElementError, GrowBuf, GrowBufError, Relocate};
//!
//! #[derive(Default)]
//! struct Pinned;
//!
//! impl Relocate for Pinned {
//!     const MAY_FAIL: bool = true;
//!
//!     fn try_relocate(&self) -> Result<(), ElementError> {
//!         Err(ElementError::new("pinned"))
//!     }
//! }
//!
//! let mut buf: GrowBuf<Pinned> = GrowBuf::with_len(3).unwrap();
//! assert!(matches!(buf.push(Pinned), Err(GrowBufError::Relocate { index: 0, .. })));
//! assert_eq!((buf.len(), buf.capacity()), (3, 3));
//! ```
//!
//! # Performance Characteristics
//!
//! - `push()`: amortized O(1), capacity doubles when full
//! - `pop()`, `at()`, `len()`, `capacity()`: O(1)
//! - `reserve()`: O(len) when it reallocates
//! - Iteration: a plain slice traversal, no allocation
//!
//! ## `no_std` Compatibility
//!
//! Only `core` and `alloc` are used. Enable the `std` feature for
//! `std::error::Error` integration through `thiserror/std`.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod boxed;
mod buf;
mod error;
mod iter;
mod relocate;

pub use boxed::AllocBox;
pub use buf::{GrowBuf, GROWTH_FACTOR, LARGE_ELEMENT_BYTES, MIN_NON_ZERO_CAP};
pub use error::{ElementError, GrowBufError};
pub use iter::IntoIter;
pub use rawalloc::{AllocError, AllocStats, AllocStrategy, Arena, Counting, Heap};
pub use relocate::Relocate;
