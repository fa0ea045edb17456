//! # cdata
//!
//! Generic, ownership-aware containers for storage analysis tooling.
//!
//! ## Overview
//!
//! The containers never inspect the values they hold. Cloning, releasing and
//! merging values go through the traits in [`ownership`], and every storage
//! request goes through an [`allocation::AllocationStrategy`], so allocation
//! failures and value callback failures are reported as [`Error`]s and leave
//! the containers in a well-defined state.
//!
//! - **Tree**: [`tree::Forest`], arena-backed n-ary trees with ordered,
//!   doubly linked children, iterative teardown and cloning
//! - **Range list**: [`range_list::RangeList`], sorted non-overlapping
//!   intervals that coalesce on insertion and split on removal
//!
//! ## Feature Flags
//!
//! - `tree`: The tree container (default)
//! - `range-list`: The range list container (default)
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust
//! use cdata::prelude::*;
//!
//! let mut list: RangeList<Vec<u32>> = RangeList::new();
//! list.insert_merge(0, 512, vec![1]).unwrap();
//! list.insert_merge(512, 1024, vec![2]).unwrap();
//! assert_eq!(list.get(700).unwrap(), &vec![1, 2]);
//!
//! let mut forest: Forest<u32> = Forest::new();
//! let root = forest.create_node_with_value(0).unwrap();
//! let leaf = forest.create_node_with_value(1).unwrap();
//! forest.append_child(root, leaf).unwrap();
//! assert_eq!(forest.leaf_nodes(root).unwrap(), vec![leaf]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports the containers, the ownership traits and the error types.
///
/// # Usage
///
/// ```rust
/// use cdata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::allocation::{AllocationStrategy, SystemAllocation};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::ownership::{Merge, Release, TryClone};

    #[cfg(feature = "tree")]
    pub use crate::tree::{Forest, InsertFlags, InsertOutcome, NodeId};

    #[cfg(feature = "range-list")]
    pub use crate::range_list::{RangeList, RangeListValue};
}

pub mod allocation;
pub mod error;
pub mod ownership;

#[cfg(feature = "tree")]
pub mod tree;

#[cfg(feature = "range-list")]
pub mod range_list;

pub use error::{Error, ErrorKind, Result};
