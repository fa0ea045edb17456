//! Error types shared by every container in this crate.
//!
//! Every fallible operation returns [`Result<T>`], whose error side is an
//! [`Error`]: a classification ([`ErrorKind`]), a human readable message and
//! an optional chain of causes.
//!
//! # Examples
//!
//! ```rust
//! use cdata::{Error, ErrorKind};
//!
//! let low_level = Error::allocation("unable to grow node storage");
//! let error = Error::callback("unable to clone value").caused_by(low_level);
//!
//! assert_eq!(error.kind(), ErrorKind::CallbackFailure);
//! assert_eq!(error.causes().count(), 1);
//! ```

use std::borrow::Cow;
use std::collections::TryReserveError;

/// Boxed cause stored in an [`Error`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A handle, bound or structural precondition was not met.
    InvalidArgument,
    /// An index was not smaller than the number of elements.
    OutOfBounds,
    /// Memory for the operation could not be obtained.
    AllocationFailure,
    /// A caller supplied clone, release or merge function failed.
    CallbackFailure,
    /// An interval overlaps an existing entry and no merge function was given.
    Conflict,
    /// No entry covers the requested offset.
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::OutOfBounds => "out of bounds",
            Self::AllocationFailure => "allocation failure",
            Self::CallbackFailure => "callback failure",
            Self::Conflict => "conflict",
            Self::NotFound => "not found",
        };
        formatter.write_str(name)
    }
}

/// A structured error with an optional cause chain.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    cause: Option<Cause>,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an [`ErrorKind::InvalidArgument`] error.
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Creates an [`ErrorKind::OutOfBounds`] error.
    pub fn out_of_bounds(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::OutOfBounds, message)
    }

    /// Creates an [`ErrorKind::AllocationFailure`] error.
    pub fn allocation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AllocationFailure, message)
    }

    /// Creates an [`ErrorKind::CallbackFailure`] error.
    pub fn callback(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::CallbackFailure, message)
    }

    /// Creates an [`ErrorKind::Conflict`] error.
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates an [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Attaches `cause` at the end of this error's cause chain.
    ///
    /// If the error already has a cause, the new cause is appended below the
    /// deepest [`Error`] in the chain. A foreign error at the end of the chain
    /// is replaced by an [`Error`] carrying its message, so the chain can
    /// continue.
    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<Cause>) -> Self {
        let cause = cause.into();
        self.append_cause(cause);
        self
    }

    fn append_cause(&mut self, cause: Cause) {
        match self.cause.as_mut() {
            None => self.cause = Some(cause),
            Some(existing) => match existing.downcast_mut::<Self>() {
                Some(inner) => inner.append_cause(cause),
                None => {
                    // A foreign cause cannot carry a cause of its own, keep its text.
                    let foreign = self.cause.take().map(|foreign| foreign.to_string());
                    self.cause = Some(Box::new(Self {
                        kind: self.kind,
                        message: Cow::Owned(foreign.unwrap_or_default()),
                        cause: Some(cause),
                    }));
                }
            },
        }
    }

    /// Returns the classification of this error.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message of this error, without its kind or causes.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` for [`ErrorKind::InvalidArgument`] and
    /// [`ErrorKind::OutOfBounds`].
    #[inline]
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidArgument | ErrorKind::OutOfBounds
        )
    }

    /// Iterates over the cause chain, nearest cause first.
    pub fn causes(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
        let first: Option<&(dyn std::error::Error + 'static)> = self
            .cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static));
        std::iter::successors(first, |cause| cause.source())
    }
}

impl From<TryReserveError> for Error {
    fn from(error: TryReserveError) -> Self {
        Self::allocation("unable to reserve storage").caused_by(error)
    }
}

impl From<smallvec::CollectionAllocErr> for Error {
    fn from(error: smallvec::CollectionAllocErr) -> Self {
        let detail = match error {
            smallvec::CollectionAllocErr::CapacityOverflow => "capacity overflow",
            smallvec::CollectionAllocErr::AllocErr { .. } => "allocator returned an error",
        };
        Self::allocation(format!("unable to reserve work list storage: {detail}"))
    }
}
