//! A single entry of a [`RangeList`](super::RangeList).

use std::ops::Range;

use crate::error::{Error, Result};
use crate::ownership::{Merge, Release, TryClone};

/// A non-empty, half-open interval `[start, end)` that owns a value.
///
/// # Examples
///
/// ```rust
/// use cdata::range_list::RangeListValue;
///
/// let entry = RangeListValue::new(512, 1024, "boot sector").unwrap();
/// assert_eq!(entry.size(), 512);
/// assert!(entry.contains(512));
/// assert!(!entry.contains(1024));
///
/// assert!(RangeListValue::new(10, 10, ()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeListValue<V> {
    start: u64,
    end: u64,
    value: V,
}

impl<V> RangeListValue<V> {
    /// Creates an entry covering `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if
    /// `start >= end`.
    pub fn new(start: u64, end: u64, value: V) -> Result<Self> {
        check_bounds(start, end)?;
        Ok(Self { start, end, value })
    }

    /// Creates an entry covering `size` units from `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `size` is
    /// zero or `start + size` overflows.
    pub fn with_size(start: u64, size: u64, value: V) -> Result<Self> {
        let end = start
            .checked_add(size)
            .ok_or_else(|| Error::invalid_argument("range end value out of bounds"))?;
        Self::new(start, end, value)
    }

    /// First offset covered by the entry.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// First offset after the entry.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of offsets covered, always at least one.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.end - self.start
    }

    /// The covered interval.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    /// The owned value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// The owned value, mutably.
    #[inline]
    pub const fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Hands the value back to the caller.
    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Splits the entry into its interval and its value.
    #[inline]
    pub fn into_parts(self) -> (Range<u64>, V) {
        (self.start..self.end, self.value)
    }

    /// Returns `true` if `offset` lies inside the entry.
    #[inline]
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Returns `true` if `[start, end)` shares at least one offset with the
    /// entry.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, start: u64, end: u64) -> bool {
        start < self.end && self.start < end
    }

    /// Returns `true` if `[start, end)` overlaps the entry or is directly
    /// adjacent to it.
    #[inline]
    #[must_use]
    pub const fn touches(&self, start: u64, end: u64) -> bool {
        start <= self.end && self.start <= end
    }

    /// Combines two touching entries into one covering both intervals.
    ///
    /// `merge` receives this entry's value first and `other`'s second.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if the entries
    ///   neither overlap nor touch.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if `merge` fails.
    pub fn merge_with<F>(&self, other: &Self, merge: F) -> Result<Self>
    where
        F: FnOnce(&V, &V) -> Result<V>,
    {
        if !self.touches(other.start, other.end) {
            return Err(Error::invalid_argument(format!(
                "range {}..{} does not touch {}..{}",
                other.start, other.end, self.start, self.end
            )));
        }
        let value = merge(&self.value, &other.value)
            .map_err(|error| Error::callback("unable to merge range values").caused_by(error))?;
        Ok(Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            value,
        })
    }

    /// [`RangeListValue::merge_with`] using [`Merge::merge`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`RangeListValue::merge_with`].
    pub fn merge(&self, other: &Self) -> Result<Self>
    where
        V: Merge,
    {
        self.merge_with(other, V::merge)
    }

    pub(crate) const fn set_start(&mut self, start: u64) {
        debug_assert!(start < self.end);
        self.start = start;
    }

    pub(crate) const fn set_end(&mut self, end: u64) {
        debug_assert!(self.start < end);
        self.end = end;
    }

    /// Builds an entry whose bounds were already validated.
    pub(crate) const fn from_checked(start: u64, end: u64, value: V) -> Self {
        Self { start, end, value }
    }
}

impl<V: TryClone> TryClone for RangeListValue<V> {
    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            start: self.start,
            end: self.end,
            value: self.value.try_clone()?,
        })
    }
}

impl<V: Release> Release for RangeListValue<V> {
    #[inline]
    fn release(&mut self) -> Result<()> {
        self.value.release()
    }
}

pub(crate) fn check_bounds(start: u64, end: u64) -> Result<()> {
    if start >= end {
        return Err(Error::invalid_argument(format!(
            "invalid range {start}..{end} - start must be smaller than end"
        )));
    }
    Ok(())
}
