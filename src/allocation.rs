//! Allocation strategies.
//!
//! Every container routes its storage growth through an
//! [`AllocationStrategy`]. The default, [`SystemAllocation`], asks the global
//! allocator through [`Vec::try_reserve`], so an out-of-memory condition is
//! reported as [`ErrorKind::AllocationFailure`](crate::ErrorKind) instead of
//! aborting the process.
//!
//! [`FailingAllocation`] fails one chosen allocation request. It exists so
//! rollback paths can be exercised deterministically: run an operation with
//! the Nth request failing for N = 0, 1, 2, ... until the operation no
//! longer triggers the fault.
//!
//! # Examples
//!
//! ```rust
//! use cdata::allocation::{AllocationStrategy, FailingAllocation};
//!
//! let allocation = FailingAllocation::fail_at(1);
//! let mut buffer: Vec<u8> = Vec::new();
//!
//! assert!(allocation.try_reserve(&mut buffer, 4).is_ok());
//! assert!(allocation.try_reserve(&mut buffer, 4).is_err());
//! assert!(allocation.has_failed());
//! ```

use std::cell::Cell;

use smallvec::{Array, SmallVec};

use crate::error::{Error, Result};

/// Source of storage for the containers in this crate.
pub trait AllocationStrategy {
    /// Reserves room for at least `additional` more elements in `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the
    /// storage cannot be obtained. `buffer` is left unchanged in that case.
    fn try_reserve<T>(&self, buffer: &mut Vec<T>, additional: usize) -> Result<()>;

    /// Reserves room for at least `additional` more elements in an inline
    /// buffer, spilling it to the heap when needed.
    ///
    /// Counts as one request even when the buffer does not spill.
    ///
    /// # Errors
    ///
    /// Same conditions as [`AllocationStrategy::try_reserve`].
    fn try_reserve_inline<A: Array>(
        &self,
        buffer: &mut SmallVec<A>,
        additional: usize,
    ) -> Result<()>;
}

/// Allocates from the global allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemAllocation;

impl AllocationStrategy for SystemAllocation {
    #[inline]
    fn try_reserve<T>(&self, buffer: &mut Vec<T>, additional: usize) -> Result<()> {
        buffer.try_reserve(additional).map_err(Error::from)
    }

    #[inline]
    fn try_reserve_inline<A: Array>(
        &self,
        buffer: &mut SmallVec<A>,
        additional: usize,
    ) -> Result<()> {
        buffer.try_reserve(additional).map_err(Error::from)
    }
}

/// Fails exactly one allocation request, counted from zero.
///
/// After the fault has fired, or when no fault is armed, requests are served
/// by [`SystemAllocation`].
#[derive(Debug, Default)]
pub struct FailingAllocation {
    remaining: Cell<Option<usize>>,
    requests: Cell<usize>,
    failed: Cell<bool>,
}

impl FailingAllocation {
    /// Creates a strategy that never fails.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            remaining: Cell::new(None),
            requests: Cell::new(0),
            failed: Cell::new(false),
        }
    }

    /// Creates a strategy whose request number `attempt` fails.
    #[must_use]
    pub const fn fail_at(attempt: usize) -> Self {
        Self {
            remaining: Cell::new(Some(attempt)),
            requests: Cell::new(0),
            failed: Cell::new(false),
        }
    }

    /// Arms the fault again, failing the request `attempt` requests from now.
    pub fn arm(&self, attempt: usize) {
        self.remaining.set(Some(attempt));
        self.failed.set(false);
    }

    /// Disarms a pending fault.
    pub fn disarm(&self) {
        self.remaining.set(None);
    }

    /// Returns `true` once the armed fault has fired.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed.get()
    }

    /// Number of allocation requests seen so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl FailingAllocation {
    fn admit(&self) -> Result<()> {
        self.requests.set(self.requests.get() + 1);
        match self.remaining.get() {
            Some(0) => {
                self.remaining.set(None);
                self.failed.set(true);
                tracing::trace!(request = self.requests.get(), "injected allocation failure");
                Err(Error::allocation("injected allocation failure"))
            }
            Some(attempt) => {
                self.remaining.set(Some(attempt - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl AllocationStrategy for FailingAllocation {
    fn try_reserve<T>(&self, buffer: &mut Vec<T>, additional: usize) -> Result<()> {
        self.admit()?;
        SystemAllocation.try_reserve(buffer, additional)
    }

    fn try_reserve_inline<A: Array>(
        &self,
        buffer: &mut SmallVec<A>,
        additional: usize,
    ) -> Result<()> {
        self.admit()?;
        SystemAllocation.try_reserve_inline(buffer, additional)
    }
}

impl<S: AllocationStrategy + ?Sized> AllocationStrategy for &S {
    #[inline]
    fn try_reserve<T>(&self, buffer: &mut Vec<T>, additional: usize) -> Result<()> {
        (**self).try_reserve(buffer, additional)
    }

    #[inline]
    fn try_reserve_inline<A: Array>(
        &self,
        buffer: &mut SmallVec<A>,
        additional: usize,
    ) -> Result<()> {
        (**self).try_reserve_inline(buffer, additional)
    }
}

static_assertions::assert_impl_all!(SystemAllocation: Send, Sync, Copy);
static_assertions::assert_not_impl_any!(FailingAllocation: Sync);
