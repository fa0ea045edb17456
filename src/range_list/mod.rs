//! Sorted, self-coalescing lists of half-open intervals.
//!
//! A [`RangeList`] keeps [`RangeListValue`] entries ordered by start offset
//! and never lets two entries overlap. Inserting an interval that overlaps
//! or touches existing entries either merges them into one entry (when a
//! merge function is available) or is rejected.
//!
//! ```text
//!   before   [0 ── a ── 10)          [20 ── c ── 30)
//!   insert              [10 ── b ── 20)
//!   after    [0 ────────────── abc ───────────── 30)
//! ```
//!
//! Removing an interval trims the entries it cuts, and splits an entry that
//! strictly contains it into two entries that own independent copies of the
//! value.
//!
//! # Time Complexity
//!
//! | Operation      | Complexity          |
//! |----------------|---------------------|
//! | `get`          | O(log n)            |
//! | `range_query`  | O(log n)            |
//! | `insert`       | O(n)                |
//! | `insert_merge` | O(n + k * merge)    |
//! | `remove`       | O(n)                |
//!
//! # Examples
//!
//! ```rust
//! use cdata::range_list::RangeList;
//!
//! let mut list: RangeList<String> = RangeList::new();
//! list.insert_merge(0, 10, "a".to_string()).unwrap();
//! list.insert_merge(10, 20, "b".to_string()).unwrap();
//!
//! assert_eq!(list.len(), 1);
//! assert_eq!(list.get(15).unwrap(), "ab");
//!
//! let removed = list.remove(3, 7).unwrap();
//! assert!(removed.is_empty());
//! let ranges: Vec<_> = list.iter().map(|entry| entry.range()).collect();
//! assert_eq!(ranges, vec![0..3, 7..20]);
//! ```

mod value;

use std::ops::Range;

use crate::allocation::{AllocationStrategy, SystemAllocation};
use crate::error::{Error, Result};
use crate::ownership::{Merge, Release, TryClone};

use value::check_bounds;
pub use value::RangeListValue;

/// Entry capacity reserved by [`RangeList::initialize`].
pub const INITIAL_CAPACITY: usize = 8;

/// A sorted list of non-overlapping intervals with attached values.
///
/// # Type Parameters
///
/// * `V` - The value type attached to each interval.
/// * `A` - The [`AllocationStrategy`] used to grow entry storage.
///
/// # Invariants
///
/// For consecutive entries `i` and `i + 1`: `start[i] < start[i + 1]` and
/// `end[i] <= start[i + 1]`.
#[derive(Debug)]
pub struct RangeList<V, A: AllocationStrategy = SystemAllocation> {
    entries: Vec<RangeListValue<V>>,
    allocation: A,
}

impl<V> RangeList<V> {
    /// Creates an empty list using the system allocator.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_allocation(SystemAllocation)
    }

    /// Creates an empty list with [`INITIAL_CAPACITY`] reserved entries and
    /// stores it in `destination`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RangeList::initialize_with`].
    pub fn initialize(destination: &mut Option<Self>) -> Result<()> {
        Self::initialize_with(destination, SystemAllocation)
    }
}

impl<V> Default for RangeList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A: AllocationStrategy> RangeList<V, A> {
    /// Creates an empty list that grows through `allocation`.
    #[inline]
    #[must_use]
    pub const fn with_allocation(allocation: A) -> Self {
        Self {
            entries: Vec::new(),
            allocation,
        }
    }

    /// Creates an empty list with [`INITIAL_CAPACITY`] reserved entries,
    /// growing through `allocation`, and stores it in `destination`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `destination`
    ///   already holds a list; it is left untouched.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the initial
    ///   capacity cannot be reserved; `destination` stays `None`.
    pub fn initialize_with(destination: &mut Option<Self>, allocation: A) -> Result<()> {
        if destination.is_some() {
            return Err(Error::invalid_argument(
                "invalid range list - value already set",
            ));
        }
        let mut list = Self::with_allocation(allocation);
        list.allocation.try_reserve(&mut list.entries, INITIAL_CAPACITY)?;
        *destination = Some(list);
        Ok(())
    }

    /// Returns the allocation strategy.
    #[inline]
    pub const fn allocation(&self) -> &A {
        &self.allocation
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list has no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at zero-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfBounds`](crate::ErrorKind) if `index` is not
    /// smaller than [`RangeList::len`].
    pub fn get_by_index(&self, index: usize) -> Result<&RangeListValue<V>> {
        self.entries.get(index).ok_or_else(|| {
            Error::out_of_bounds(format!(
                "range list value index {index} out of bounds for {} entries",
                self.entries.len()
            ))
        })
    }

    /// Entries in ascending order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, RangeListValue<V>> {
        self.entries.iter()
    }

    /// Entries as a slice, in ascending order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[RangeListValue<V>] {
        &self.entries
    }

    /// Entry with the lowest start offset.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&RangeListValue<V>> {
        self.entries.first()
    }

    /// Entry with the highest start offset.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&RangeListValue<V>> {
        self.entries.last()
    }

    /// Interval from the start of the first entry to the end of the last.
    #[must_use]
    pub fn spanning_range(&self) -> Option<Range<u64>> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        Some(first.start()..last.end())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Value of the entry covering `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`](crate::ErrorKind) if no entry covers
    /// `offset`.
    pub fn get(&self, offset: u64) -> Result<&V> {
        self.get_entry(offset).map(RangeListValue::value)
    }

    /// Entry covering `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`](crate::ErrorKind) if no entry covers
    /// `offset`.
    pub fn get_entry(&self, offset: u64) -> Result<&RangeListValue<V>> {
        let index = self.entries.partition_point(|entry| entry.end() <= offset);
        self.entries
            .get(index)
            .filter(|entry| entry.start() <= offset)
            .ok_or_else(|| Error::not_found(format!("no range covers offset {offset}")))
    }

    /// Entries sharing at least one offset with `[start, end)`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if
    /// `start >= end`.
    pub fn range_query(&self, start: u64, end: u64) -> Result<&[RangeListValue<V>]> {
        check_bounds(start, end)?;
        let (low, high) = self.overlapping(start, end);
        Ok(&self.entries[low..high])
    }

    /// Returns `true` if any entry shares an offset with `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if
    /// `start >= end`.
    pub fn contains_range(&self, start: u64, end: u64) -> Result<bool> {
        Ok(!self.range_query(start, end)?.is_empty())
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts `[start, end)` without merging.
    ///
    /// Entries that merely touch the interval are kept as separate entries.
    /// Returns the index of the new entry.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `start >= end`.
    /// - [`ErrorKind::Conflict`](crate::ErrorKind) if the interval overlaps an
    ///   existing entry.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the list cannot
    ///   grow.
    ///
    /// The list is unchanged on error.
    pub fn insert(&mut self, start: u64, end: u64, value: V) -> Result<usize> {
        check_bounds(start, end)?;
        let (low, high) = self.overlapping(start, end);
        if low < high {
            let existing = &self.entries[low];
            return Err(Error::conflict(format!(
                "range {start}..{end} overlaps existing range {}..{}",
                existing.start(),
                existing.end()
            )));
        }
        self.allocation.try_reserve(&mut self.entries, 1)?;
        self.entries
            .insert(low, RangeListValue::from_checked(start, end, value));
        tracing::trace!(start, end, index = low, "inserted range");
        Ok(low)
    }

    /// Inserts `[start, end)`, merging with [`Merge::merge`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`RangeList::insert_with`].
    pub fn insert_merge(&mut self, start: u64, end: u64, value: V) -> Result<usize>
    where
        V: Merge + Release,
    {
        self.insert_with(start, end, value, V::merge)
    }

    /// Inserts `[start, end)`, folding every overlapping or touching entry
    /// into it.
    ///
    /// The interval widens to the union of the touched entries, which may
    /// reach further entries. The first touched entry is merged as
    /// `merge(existing, value)`, and every later one as
    /// `merge(working, existing)`, so the result follows offset order. The
    /// touched entries are then replaced by one entry. Returns the index of
    /// that entry.
    ///
    /// The container owns `value` from the call on. The displaced entries,
    /// the incoming value and every intermediate result are released once
    /// they are superseded.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `start >= end`.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if `merge` or a
    ///   release fails.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the list cannot
    ///   grow.
    ///
    /// Every merge runs before the list is modified, so the list is
    /// unchanged on error, with one exception: if releasing a displaced
    /// entry fails, the merged entry is already stored.
    pub fn insert_with<F>(
        &mut self,
        start: u64,
        end: u64,
        value: V,
        mut merge: F,
    ) -> Result<usize>
    where
        V: Release,
        F: FnMut(&V, &V) -> Result<V>,
    {
        let mut incoming = value;
        if let Err(error) = check_bounds(start, end) {
            return Err(discard(&mut incoming, error));
        }
        let (low, high, merged_start, merged_end) = self.touching(start, end);

        if low == high {
            if let Err(error) = self.allocation.try_reserve(&mut self.entries, 1) {
                return Err(discard(&mut incoming, error));
            }
            self.entries
                .insert(low, RangeListValue::from_checked(start, end, incoming));
            tracing::trace!(start, end, index = low, "inserted range");
            return Ok(low);
        }

        let mut working = match self.fold_touched(low, high, &incoming, &mut merge) {
            Ok(working) => working,
            Err(error) => return Err(discard(&mut incoming, error)),
        };
        if let Err(error) = incoming.release() {
            let error = Error::callback("unable to free merged range value").caused_by(error);
            return Err(discard(&mut working, error));
        }

        let merged = RangeListValue::from_checked(merged_start, merged_end, working);
        let first = std::mem::replace(&mut self.entries[low], merged);
        let displaced = std::iter::once(first).chain(self.entries.drain(low + 1..high));
        let mut failure: Option<Error> = None;
        for mut entry in displaced {
            if let Err(error) = entry.release() {
                tracing::warn!(
                    start = entry.start(),
                    end = entry.end(),
                    %error,
                    "release failed for merged range list value"
                );
                failure = Some(match failure {
                    Some(failure) => failure.caused_by(error),
                    None => Error::callback("unable to free merged range value").caused_by(error),
                });
            }
        }
        tracing::debug!(
            start = merged_start,
            end = merged_end,
            merged = high - low,
            "merged ranges"
        );
        failure.map_or(Ok(low), Err)
    }

    fn fold_touched<F>(&self, low: usize, high: usize, incoming: &V, merge: &mut F) -> Result<V>
    where
        V: Release,
        F: FnMut(&V, &V) -> Result<V>,
    {
        let merge_error = |existing: &RangeListValue<V>, error: Error| {
            Error::callback(format!(
                "unable to merge range {}..{}",
                existing.start(),
                existing.end()
            ))
            .caused_by(error)
        };

        let first = &self.entries[low];
        let mut working =
            merge(first.value(), incoming).map_err(|error| merge_error(first, error))?;
        for existing in &self.entries[low + 1..high] {
            let next = match merge(&working, existing.value()) {
                Ok(next) => next,
                Err(error) => return Err(discard(&mut working, merge_error(existing, error))),
            };
            let mut superseded = std::mem::replace(&mut working, next);
            if let Err(error) = superseded.release() {
                let error = Error::callback("unable to free merged range value").caused_by(error);
                return Err(discard(&mut working, error));
            }
        }
        Ok(working)
    }

    /// Inserts a copy of every entry of `other`, merging with
    /// [`Merge::merge`].
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if cloning or
    ///   merging a value fails.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the list cannot
    ///   grow.
    ///
    /// The entries are merged into a copy of this list that replaces it only
    /// when every entry was inserted, so the list is unchanged on error.
    pub fn insert_range_list<B>(&mut self, other: &RangeList<V, B>) -> Result<()>
    where
        V: TryClone + Merge + Release,
        B: AllocationStrategy,
    {
        let mut staged = RangeList {
            entries: self.clone_entries()?,
            allocation: &self.allocation,
        };

        for entry in other {
            let value = entry
                .value()
                .try_clone()
                .map_err(|error| Error::callback("unable to clone range value").caused_by(error));
            let inserted =
                value.and_then(|value| staged.insert_merge(entry.start(), entry.end(), value));
            if let Err(error) = inserted {
                return Err(release_all(&mut staged.entries, error));
            }
        }

        let merged = staged.entries;
        let mut previous = std::mem::replace(&mut self.entries, merged);
        for entry in &mut previous {
            if let Err(error) = entry.release() {
                tracing::warn!(
                    start = entry.start(),
                    end = entry.end(),
                    %error,
                    "release failed for replaced range list value"
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes the interval `[start, end)` from the list.
    ///
    /// - entries wholly inside the interval are taken out and handed back to
    ///   the caller, in order
    /// - entries cut at one edge are shortened
    /// - an entry strictly containing the interval is split in two; the right
    ///   remainder owns a [`TryClone::try_clone`] copy of the value
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `start >= end`.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if cloning the value
    ///   of a split entry fails.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the list or the
    ///   returned entries cannot be allocated.
    ///
    /// The list is unchanged on error.
    pub fn remove(&mut self, start: u64, end: u64) -> Result<Vec<RangeListValue<V>>>
    where
        V: TryClone,
    {
        check_bounds(start, end)?;
        let (low, high) = self.overlapping(start, end);
        if low == high {
            return Ok(Vec::new());
        }

        let cut_left = self.entries[low].start() < start;
        let cut_right = self.entries[high - 1].end() > end;

        if high - low == 1 && cut_left && cut_right {
            self.split(low, start, end)?;
            return Ok(Vec::new());
        }

        let first_whole = low + usize::from(cut_left);
        let last_whole = high - usize::from(cut_right);
        let mut removed = Vec::new();
        self.allocation
            .try_reserve(&mut removed, last_whole.saturating_sub(first_whole))?;

        if cut_left {
            self.entries[low].set_end(start);
        }
        if cut_right {
            self.entries[high - 1].set_start(end);
        }
        if first_whole < last_whole {
            removed.extend(self.entries.drain(first_whole..last_whole));
        }
        tracing::trace!(start, end, removed = removed.len(), "removed range");
        Ok(removed)
    }

    fn split(&mut self, index: usize, start: u64, end: u64) -> Result<()>
    where
        V: TryClone,
    {
        self.allocation.try_reserve(&mut self.entries, 1)?;
        let entry = &self.entries[index];
        let copy = entry.value().try_clone().map_err(|error| {
            Error::callback(format!(
                "unable to clone value while splitting range {}..{}",
                entry.start(),
                entry.end()
            ))
            .caused_by(error)
        })?;
        let right = RangeListValue::from_checked(end, entry.end(), copy);

        self.entries[index].set_end(start);
        self.entries.insert(index + 1, right);
        tracing::debug!(start, end, index, "split range");
        Ok(())
    }

    // =========================================================================
    // Teardown and cloning
    // =========================================================================

    /// Releases and removes every entry, front to back.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CallbackFailure`](crate::ErrorKind) if a release
    /// fails. Entries before the failing one are gone; the failing entry and
    /// every later entry stay in the list.
    pub fn clear(&mut self) -> Result<()>
    where
        V: Release,
    {
        for index in 0..self.entries.len() {
            if let Err(error) = self.entries[index].release() {
                self.entries.drain(..index);
                return Err(Error::callback("unable to free range list value").caused_by(error));
            }
        }
        self.entries.clear();
        Ok(())
    }

    /// Releases every entry of the list in `list` and drops the list.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `list` is `None`.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if a release fails;
    ///   `list` then still holds the entries not yet freed.
    pub fn free(list: &mut Option<Self>) -> Result<()>
    where
        V: Release,
    {
        let Some(inner) = list.as_mut() else {
            return Err(Error::invalid_argument("invalid range list"));
        };
        inner.clear()?;
        *list = None;
        Ok(())
    }

    /// Returns an independent deep copy of the list.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the copy
    ///   cannot be allocated.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if a value cannot be
    ///   cloned.
    ///
    /// Values cloned before a failure are released again.
    pub fn try_clone(&self) -> Result<Self>
    where
        V: TryClone + Release,
        A: Clone,
    {
        Ok(Self {
            entries: self.clone_entries()?,
            allocation: self.allocation.clone(),
        })
    }

    /// Deep-copies `source` into `destination`.
    ///
    /// A `None` source leaves `destination` as `None`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `destination`
    ///   already holds a list.
    /// - Same conditions as [`RangeList::try_clone`]; `destination` stays
    ///   `None`.
    pub fn clone_into(destination: &mut Option<Self>, source: Option<&Self>) -> Result<()>
    where
        V: TryClone + Release,
        A: Clone,
    {
        if destination.is_some() {
            return Err(Error::invalid_argument(
                "invalid destination range list - value already set",
            ));
        }
        if let Some(source) = source {
            *destination = Some(source.try_clone()?);
        }
        Ok(())
    }

    fn clone_entries(&self) -> Result<Vec<RangeListValue<V>>>
    where
        V: TryClone + Release,
    {
        let mut entries = Vec::new();
        self.allocation.try_reserve(&mut entries, self.entries.len())?;
        for entry in &self.entries {
            match entry.try_clone() {
                Ok(copy) => entries.push(copy),
                Err(error) => {
                    let error =
                        Error::callback("unable to clone range list value").caused_by(error);
                    return Err(release_all(&mut entries, error));
                }
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Index range of the entries overlapping `[start, end)`.
    fn overlapping(&self, start: u64, end: u64) -> (usize, usize) {
        let low = self.entries.partition_point(|entry| entry.end() <= start);
        let high = self.entries.partition_point(|entry| entry.start() < end);
        (low, high.max(low))
    }

    /// Index range of the entries overlapping or touching `[start, end)`,
    /// widened until no neighbour touches the union, and the union bounds.
    fn touching(&self, start: u64, end: u64) -> (usize, usize, u64, u64) {
        let mut low = self.entries.partition_point(|entry| entry.end() < start);
        let mut high = self.entries.partition_point(|entry| entry.start() <= end);
        if high <= low {
            return (low, low, start, end);
        }

        let mut merged_start = start.min(self.entries[low].start());
        let mut merged_end = end.max(self.entries[high - 1].end());
        while low > 0 && self.entries[low - 1].end() >= merged_start {
            low -= 1;
            merged_start = merged_start.min(self.entries[low].start());
        }
        while high < self.entries.len() && self.entries[high].start() <= merged_end {
            merged_end = merged_end.max(self.entries[high].end());
            high += 1;
        }
        (low, high, merged_start, merged_end)
    }
}

/// Releases cloned entries after a failed copy, attaching release failures
/// to `error`.
fn release_all<V: Release>(entries: &mut Vec<RangeListValue<V>>, mut error: Error) -> Error {
    for entry in entries.iter_mut() {
        if let Err(rollback) = entry.release() {
            tracing::warn!(
                start = entry.start(),
                end = entry.end(),
                %rollback,
                "release failed while rolling back range list copy"
            );
            error = error.caused_by(rollback);
        }
    }
    entries.clear();
    error
}

/// Releases a value the list took ownership of but will not store.
fn discard<V: Release>(value: &mut V, error: Error) -> Error {
    match value.release() {
        Ok(()) => error,
        Err(rollback) => {
            tracing::warn!(%rollback, "release failed for discarded range list value");
            error.caused_by(rollback)
        }
    }
}

impl<'a, V, A: AllocationStrategy> IntoIterator for &'a RangeList<V, A> {
    type Item = &'a RangeListValue<V>;
    type IntoIter = std::slice::Iter<'a, RangeListValue<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

static_assertions::assert_impl_all!(RangeList<String>: Send, Sync);
