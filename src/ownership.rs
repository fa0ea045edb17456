//! The value ownership contract.
//!
//! Containers never look inside the values they store. Everything they need
//! to do with a value goes through one of the traits in this module:
//!
//! - [`Release`]: fallible teardown, called when a container frees a value
//! - [`TryClone`]: fallible deep copy, called when a container is cloned or
//!   an interval is split
//! - [`Merge`]: fallible combination, called when range list intervals
//!   overlap or touch
//!
//! Comparison uses [`Ord`].
//!
//! Implementations are provided for the primitive types and the common
//! standard library owners. `Merge` concatenates for `String` and `Vec<T>`.
//!
//! # Examples
//!
//! ```rust
//! use cdata::ownership::{Merge, Release, TryClone};
//! use cdata::Result;
//!
//! #[derive(Debug, PartialEq)]
//! struct Extent {
//!     blocks: Vec<u64>,
//! }
//!
//! impl Release for Extent {}
//!
//! impl TryClone for Extent {
//!     fn try_clone(&self) -> Result<Self> {
//!         Ok(Self { blocks: self.blocks.try_clone()? })
//!     }
//! }
//!
//! impl Merge for Extent {
//!     fn merge(existing: &Self, incoming: &Self) -> Result<Self> {
//!         Ok(Self { blocks: Vec::merge(&existing.blocks, &incoming.blocks)? })
//!     }
//! }
//!
//! let left = Extent { blocks: vec![1, 2] };
//! let right = Extent { blocks: vec![3] };
//! assert_eq!(Extent::merge(&left, &right).unwrap().blocks, vec![1, 2, 3]);
//! ```

use crate::error::Result;

/// Fallible teardown of a stored value.
///
/// Called exactly once for every value a container frees. The value is
/// dropped after `release` returns `Ok`. If `release` fails, the value stays
/// in the container and the free operation stops.
pub trait Release {
    /// Releases resources held by the value.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller of the free operation wrapped in
    /// an [`ErrorKind::CallbackFailure`](crate::ErrorKind).
    #[inline]
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fallible deep copy of a stored value.
pub trait TryClone: Sized {
    /// Returns an independent copy of the value.
    ///
    /// # Errors
    ///
    /// Any error aborts the enclosing clone or split and is reported wrapped
    /// in an [`ErrorKind::CallbackFailure`](crate::ErrorKind).
    fn try_clone(&self) -> Result<Self>;
}

/// Fallible combination of two values whose intervals overlap or touch.
pub trait Merge: Sized {
    /// Combines the value already stored in a container with an incoming
    /// value.
    ///
    /// Neither argument is modified; the containers drop both once the
    /// combined value has been stored.
    ///
    /// # Errors
    ///
    /// Any error aborts the insertion, which leaves the container unchanged.
    fn merge(existing: &Self, incoming: &Self) -> Result<Self>;
}

macro_rules! impl_copy_ownership {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Release for $ty {}

            impl TryClone for $ty {
                #[inline]
                fn try_clone(&self) -> Result<Self> {
                    Ok(*self)
                }
            }
        )*
    };
}

impl_copy_ownership!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char, ()
);

impl Merge for () {
    #[inline]
    fn merge(_existing: &Self, _incoming: &Self) -> Result<Self> {
        Ok(())
    }
}

impl Release for String {}

impl TryClone for String {
    fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::new();
        copy.try_reserve_exact(self.len())?;
        copy.push_str(self);
        Ok(copy)
    }
}

impl Merge for String {
    fn merge(existing: &Self, incoming: &Self) -> Result<Self> {
        let mut combined = Self::new();
        combined.try_reserve_exact(existing.len() + incoming.len())?;
        combined.push_str(existing);
        combined.push_str(incoming);
        Ok(combined)
    }
}

impl<T: Release> Release for Vec<T> {
    fn release(&mut self) -> Result<()> {
        self.iter_mut().try_for_each(Release::release)
    }
}

impl<T: TryClone> TryClone for Vec<T> {
    fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::new();
        copy.try_reserve_exact(self.len())?;
        for element in self {
            copy.push(element.try_clone()?);
        }
        Ok(copy)
    }
}

impl<T: TryClone> Merge for Vec<T> {
    fn merge(existing: &Self, incoming: &Self) -> Result<Self> {
        let mut combined = Self::new();
        combined.try_reserve_exact(existing.len() + incoming.len())?;
        for element in existing.iter().chain(incoming) {
            combined.push(element.try_clone()?);
        }
        Ok(combined)
    }
}

impl<T: Release + ?Sized> Release for Box<T> {
    #[inline]
    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

impl<T: TryClone> TryClone for Box<T> {
    fn try_clone(&self) -> Result<Self> {
        (**self).try_clone().map(Box::new)
    }
}

impl<T: Merge> Merge for Box<T> {
    fn merge(existing: &Self, incoming: &Self) -> Result<Self> {
        T::merge(existing, incoming).map(Box::new)
    }
}

impl<T: Release> Release for Option<T> {
    #[inline]
    fn release(&mut self) -> Result<()> {
        self.as_mut().map_or(Ok(()), Release::release)
    }
}

impl<T: TryClone> TryClone for Option<T> {
    fn try_clone(&self) -> Result<Self> {
        self.as_ref().map(TryClone::try_clone).transpose()
    }
}
