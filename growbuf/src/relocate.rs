//! The element capability required by [`GrowBuf`](crate::GrowBuf).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

use crate::error::ElementError;

/// Types that a [`GrowBuf`](crate::GrowBuf) may move to a new region.
///
/// Moving a value is a bitwise transfer of ownership and cannot fail. The
/// trait adds a veto: when [`MAY_FAIL`](Relocate::MAY_FAIL) is `true`, the
/// buffer asks every live element through
/// [`try_relocate`](Relocate::try_relocate) before any of them moves, and a
/// refusal aborts the growth with the buffer untouched.
///
/// Most types take the defaults:
///
/// ```
/// use growbuf::{GrowBuf, Relocate};
///
/// struct Token(u64);
/// impl Relocate for Token {}
///
/// let mut buf = GrowBuf::new();
/// buf.push(Token(7)).unwrap();
/// assert_eq!(buf.at(0).map(|t| t.0), Some(7));
/// ```
///
/// A type without the capability cannot be stored:
///
/// ```compile_fail
/// use growbuf::GrowBuf;
///
/// struct Opaque;
/// let buf: GrowBuf<Opaque> = GrowBuf::new();
/// ```
pub trait Relocate {
    /// `false` when [`try_relocate`](Relocate::try_relocate) always succeeds.
    const MAY_FAIL: bool = false;

    /// Called on the element, still at its old address, before it moves.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] to refuse the move.
    fn try_relocate(&self) -> Result<(), ElementError> {
        Ok(())
    }
}

/// Implements [`Relocate`] with the infallible defaults for the listed types.
#[macro_export]
macro_rules! impl_relocate {
    ($($ty:ty),* $(,)?) => {
        $(impl $crate::Relocate for $ty {})*
    };
}

impl_relocate!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String,
);

impl<T: ?Sized> Relocate for Box<T> {}
impl<T> Relocate for Vec<T> {}
impl<T: ?Sized> Relocate for Rc<T> {}
impl<T: ?Sized> Relocate for Arc<T> {}
impl<T: ?Sized> Relocate for &T {}
impl<T: ?Sized> Relocate for &mut T {}
impl<T: ?Sized> Relocate for PhantomData<T> {}
impl<T> Relocate for Cell<T> {}
impl<T> Relocate for RefCell<T> {}

impl<T: Relocate> Relocate for Option<T> {
    const MAY_FAIL: bool = T::MAY_FAIL;

    fn try_relocate(&self) -> Result<(), ElementError> {
        match self {
            Some(value) => value.try_relocate(),
            None => Ok(()),
        }
    }
}

impl<T: Relocate, const N: usize> Relocate for [T; N] {
    const MAY_FAIL: bool = T::MAY_FAIL;

    fn try_relocate(&self) -> Result<(), ElementError> {
        self.iter().try_for_each(Relocate::try_relocate)
    }
}

impl<A: Relocate, B: Relocate> Relocate for (A, B) {
    const MAY_FAIL: bool = A::MAY_FAIL || B::MAY_FAIL;

    fn try_relocate(&self) -> Result<(), ElementError> {
        self.0.try_relocate()?;
        self.1.try_relocate()
    }
}

impl<A: Relocate, B: Relocate, C: Relocate> Relocate for (A, B, C) {
    const MAY_FAIL: bool = A::MAY_FAIL || B::MAY_FAIL || C::MAY_FAIL;

    fn try_relocate(&self) -> Result<(), ElementError> {
        self.0.try_relocate()?;
        self.1.try_relocate()?;
        self.2.try_relocate()
    }
}
