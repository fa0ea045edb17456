//! Arena-backed n-ary trees.
//!
//! A [`Forest`] stores any number of trees. Each node is addressed by a
//! [`NodeId`], owns an optional value, and keeps its children as an ordered,
//! doubly linked sequence:
//!
//! ```text
//!                 parent
//!           first_child │ last_child
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!        child ◄──► child ◄──────► child
//!           previous_sibling / next_sibling
//! ```
//!
//! A node is either a root (no parent, no siblings) or attached to exactly
//! one parent. Attaching a node that is already attached, or attaching a node
//! below one of its own descendants, is rejected instead of silently moving
//! or creating a cycle.
//!
//! Teardown ([`Forest::free`]) and copying ([`Forest::clone_tree`]) run
//! iteratively, so arbitrarily deep trees do not grow the call stack.
//!
//! # Examples
//!
//! ```rust
//! use cdata::tree::Forest;
//!
//! let mut forest: Forest<String> = Forest::new();
//! let root = forest.create_node().unwrap();
//! let child = forest.create_node_with_value("partition".to_string()).unwrap();
//! forest.append_child(root, child).unwrap();
//!
//! assert_eq!(forest.number_of_sub_nodes(root).unwrap(), 1);
//! assert_eq!(forest.child_by_index(root, 0).unwrap(), child);
//!
//! let mut handle = Some(root);
//! forest.free(&mut handle).unwrap();
//! assert!(handle.is_none());
//! assert!(forest.is_empty());
//! ```

mod arena;

use std::cmp::Ordering;
use std::iter::FusedIterator;

use smallvec::SmallVec;

use crate::allocation::{AllocationStrategy, SystemAllocation};
use crate::error::{Error, Result};
use crate::ownership::{Release, TryClone};

use arena::{Arena, Links, NodeData};
pub use arena::NodeId;

/// Pending work items kept inline while cloning shallow trees.
const CLONE_WORK_INLINE: usize = 16;

/// Options for [`Forest::insert_child_sorted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InsertFlags(u8);

impl InsertFlags {
    /// Equal values are allowed; the new node goes after its equals.
    pub const NONE: Self = Self(0);
    /// A child with an equal value prevents the insertion.
    pub const UNIQUE_ENTRIES: Self = Self(1);

    /// Returns `true` if every flag in `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for InsertFlags {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Result of [`Forest::insert_child_sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The node was linked at the given zero-based position.
    Inserted(usize),
    /// A child with an equal value exists; the node was left detached.
    Existing(NodeId),
}

/// A collection of n-ary trees stored in one arena.
///
/// # Type Parameters
///
/// * `V` - The value type stored in the nodes.
/// * `A` - The [`AllocationStrategy`] used to grow node storage.
///
/// # Ownership
///
/// Values handed to the forest are owned by it until they are taken back
/// ([`Forest::take_value`], [`Forest::set_value`]) or freed
/// ([`Forest::free`]). Dropping the forest drops every remaining value
/// without calling [`Release::release`].
#[derive(Debug)]
pub struct Forest<V, A: AllocationStrategy = SystemAllocation> {
    arena: Arena<V>,
    allocation: A,
}

impl<V> Forest<V> {
    /// Creates an empty forest using the system allocator.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_allocation(SystemAllocation)
    }
}

impl<V> Default for Forest<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A: AllocationStrategy> Forest<V, A> {
    /// Creates an empty forest that grows through `allocation`.
    #[inline]
    #[must_use]
    pub const fn with_allocation(allocation: A) -> Self {
        Self {
            arena: Arena::new(),
            allocation,
        }
    }

    /// Returns the allocation strategy.
    #[inline]
    pub const fn allocation(&self) -> &A {
        &self.allocation
    }

    /// Number of live nodes across all trees.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if the forest holds no nodes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Returns `true` if `id` refers to a live node of this forest.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an empty root node and stores its handle in `destination`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `destination`
    ///   already holds a handle; it is left untouched.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if node storage
    ///   cannot grow; `destination` stays `None`.
    pub fn initialize(&mut self, destination: &mut Option<NodeId>) -> Result<()> {
        if destination.is_some() {
            return Err(Error::invalid_argument(
                "invalid destination node - value already set",
            ));
        }
        *destination = Some(self.create_node()?);
        Ok(())
    }

    /// Creates an empty root node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AllocationFailure`](crate::ErrorKind) if node
    /// storage cannot grow.
    pub fn create_node(&mut self) -> Result<NodeId> {
        let id = self.arena.insert(&self.allocation, None)?;
        tracing::trace!(node = ?id, "created tree node");
        Ok(id)
    }

    /// Creates a root node owning `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AllocationFailure`](crate::ErrorKind) if node
    /// storage cannot grow. `value` is dropped in that case.
    pub fn create_node_with_value(&mut self, value: V) -> Result<NodeId> {
        let id = self.arena.insert(&self.allocation, Some(value))?;
        tracing::trace!(node = ?id, "created tree node with value");
        Ok(id)
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Returns the value of a node, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn value(&self, id: NodeId) -> Result<Option<&V>> {
        Ok(self.node(id)?.value.as_ref())
    }

    /// Returns the value of a node mutably, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn value_mut(&mut self, id: NodeId) -> Result<Option<&mut V>> {
        Ok(self.node_mut(id)?.value.as_mut())
    }

    /// Stores `value` in a node, handing back the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn set_value(&mut self, id: NodeId, value: V) -> Result<Option<V>> {
        Ok(self.node_mut(id)?.value.replace(value))
    }

    /// Removes the value from a node, handing it back to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn take_value(&mut self, id: NodeId) -> Result<Option<V>> {
        Ok(self.node_mut(id)?.value.take())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Parent of a node; `None` for a root.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.links(id)?.parent)
    }

    /// Sibling before a node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn previous_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.links(id)?.previous_sibling)
    }

    /// Sibling after a node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn next_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.links(id)?.next_sibling)
    }

    /// First child of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn first_child(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.links(id)?.first_child)
    }

    /// Last child of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn last_child(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.links(id)?.last_child)
    }

    /// Number of direct children of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn number_of_sub_nodes(&self, id: NodeId) -> Result<usize> {
        Ok(self.links(id)?.number_of_sub_nodes)
    }

    /// Returns `true` if the node has no parent.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn is_root(&self, id: NodeId) -> Result<bool> {
        Ok(self.links(id)?.parent.is_none())
    }

    /// Returns `true` if the node has no children.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn is_leaf(&self, id: NodeId) -> Result<bool> {
        Ok(self.links(id)?.first_child.is_none())
    }

    /// Child at zero-based `index`.
    ///
    /// Walks from whichever end of the child sequence is closer.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale handle.
    /// - [`ErrorKind::OutOfBounds`](crate::ErrorKind) if `index` is not
    ///   smaller than the number of children.
    pub fn child_by_index(&self, parent: NodeId, index: usize) -> Result<NodeId> {
        let links = self.links(parent)?;
        let count = links.number_of_sub_nodes;
        if index >= count {
            return Err(Error::out_of_bounds(format!(
                "sub node index {index} out of bounds for {count} sub nodes"
            )));
        }

        let found = if index < count / 2 {
            self.children_unchecked(links.first_child).nth(index)
        } else {
            let mut current = links.last_child;
            for _ in 0..(count - 1 - index) {
                current = current.and_then(|id| self.arena.get(id)?.links.previous_sibling);
            }
            current
        };
        found.ok_or_else(|| Error::out_of_bounds("sub node sequence shorter than its count"))
    }

    /// Iterates over the direct children of a node in order.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn children(&self, parent: NodeId) -> Result<Children<'_, V>> {
        Ok(self.children_unchecked(self.links(parent)?.first_child))
    }

    /// Finds the first child whose value equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale
    /// handle.
    pub fn find_child_by_value(&self, parent: NodeId, value: &V) -> Result<Option<NodeId>>
    where
        V: Ord,
    {
        Ok(self.children(parent)?.find(|&child| {
            self.arena
                .get(child)
                .and_then(|node| node.value.as_ref())
                .is_some_and(|candidate| candidate.cmp(value) == Ordering::Equal)
        }))
    }

    /// Collects every leaf of the sub-tree rooted at `root`, depth-first.
    ///
    /// A node without children is its own single leaf.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) for a stale handle.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) if the result
    ///   cannot grow.
    pub fn leaf_nodes(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.links(root)?;
        let mut leaves = Vec::new();
        let mut current = root;
        loop {
            let links = self.links(current)?;
            if let Some(child) = links.first_child {
                current = child;
                continue;
            }
            self.allocation.try_reserve(&mut leaves, 1)?;
            leaves.push(current);

            // Climb until a next sibling exists, without leaving the sub-tree.
            loop {
                if current == root {
                    return Ok(leaves);
                }
                let links = self.links(current)?;
                if let Some(next) = links.next_sibling {
                    current = next;
                    break;
                }
                match links.parent {
                    Some(parent) => current = parent,
                    None => return Ok(leaves),
                }
            }
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Links `child` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if a handle is
    /// stale, `child` is already attached, or `child` is `parent` or one of
    /// its ancestors. Nothing is modified in that case.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        let previous = self.links(parent)?.last_child;
        self.link(parent, child, previous, None);
        Ok(())
    }

    /// Links `child` as the first child of `parent`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Forest::append_child`].
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        let next = self.links(parent)?.first_child;
        self.link(parent, child, None, next);
        Ok(())
    }

    /// Links `child` directly before `sibling`, a child of `parent`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Forest::append_child`], plus
    /// [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `sibling` is not a
    /// child of `parent`.
    pub fn insert_child_before(
        &mut self,
        parent: NodeId,
        sibling: NodeId,
        child: NodeId,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;
        let sibling_links = self.child_links(parent, sibling)?;
        self.link(parent, child, sibling_links.previous_sibling, Some(sibling));
        Ok(())
    }

    /// Links `child` directly after `sibling`, a child of `parent`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Forest::insert_child_before`].
    pub fn insert_child_after(
        &mut self,
        parent: NodeId,
        sibling: NodeId,
        child: NodeId,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;
        let sibling_links = self.child_links(parent, sibling)?;
        self.link(parent, child, Some(sibling), sibling_links.next_sibling);
        Ok(())
    }

    /// Links `child` among the children of `parent` in value order.
    ///
    /// The child goes before the first sibling whose value is greater. Nodes
    /// without a value order before nodes with one. With
    /// [`InsertFlags::UNIQUE_ENTRIES`], a sibling with an equal value is
    /// reported as [`InsertOutcome::Existing`] and `child` stays detached.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Forest::append_child`].
    pub fn insert_child_sorted(
        &mut self,
        parent: NodeId,
        child: NodeId,
        flags: InsertFlags,
    ) -> Result<InsertOutcome>
    where
        V: Ord,
    {
        self.check_insertable(parent, child)?;
        let child_value = self.node(child)?.value.as_ref();

        let mut position = 0;
        let mut previous = None;
        let mut next = self.links(parent)?.first_child;
        while let Some(sibling) = next {
            let sibling_node = self.node(sibling)?;
            match child_value.cmp(&sibling_node.value.as_ref()) {
                Ordering::Less => break,
                Ordering::Equal if flags.contains(InsertFlags::UNIQUE_ENTRIES) => {
                    return Ok(InsertOutcome::Existing(sibling));
                }
                Ordering::Equal | Ordering::Greater => {
                    previous = Some(sibling);
                    next = sibling_node.links.next_sibling;
                    position += 1;
                }
            }
        }
        self.link(parent, child, previous, next);
        Ok(InsertOutcome::Inserted(position))
    }

    /// Detaches `child` from `parent`.
    ///
    /// The former neighbours are linked to each other and the child becomes
    /// a root with no sibling links, keeping its own sub-tree.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if a handle is
    /// stale or `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let links = self.child_links(parent, child)?;
        self.unlink(parent, child, links);
        Ok(())
    }

    /// Puts the detached `replacement` at the position of `node`.
    ///
    /// Afterwards `node` is a detached root that keeps its own sub-tree.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind) if a handle is
    /// stale, `node` has no parent, `replacement` is attached, or
    /// `replacement` is an ancestor of `node`.
    pub fn replace_node(&mut self, node: NodeId, replacement: NodeId) -> Result<()> {
        let links = self.links(node)?;
        let Some(parent) = links.parent else {
            return Err(Error::invalid_argument(
                "invalid node - missing parent node",
            ));
        };
        self.check_insertable(parent, replacement)?;

        let previous = links.previous_sibling;
        let next = links.next_sibling;
        self.unlink(parent, node, links);
        self.link(parent, replacement, previous, next);
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Frees the detached sub-tree rooted at `node`, releasing every value.
    ///
    /// Values are released depth-first, children before their parent and
    /// siblings front to back. On success `node` becomes `None`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `node` is `None`,
    ///   stale, or still attached to a parent or siblings.
    /// - [`ErrorKind::CallbackFailure`](crate::ErrorKind) if a release fails.
    ///   Freeing stops at that value; the node holding it and everything not
    ///   yet freed stay linked and reachable through `node`.
    pub fn free(&mut self, node: &mut Option<NodeId>) -> Result<()>
    where
        V: Release,
    {
        self.free_with(node, Release::release)
    }

    /// Like [`Forest::free`], with `release` called for every value.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Forest::free`].
    pub fn free_with<F>(&mut self, node: &mut Option<NodeId>, release: F) -> Result<()>
    where
        F: FnMut(&mut V) -> Result<()>,
    {
        let Some(root) = *node else {
            return Err(Error::invalid_argument("invalid tree node"));
        };
        if !self.links(root)?.is_detached() {
            return Err(Error::invalid_argument(
                "invalid tree node - connected to other nodes",
            ));
        }
        self.free_subtree(root, release)?;
        *node = None;
        Ok(())
    }

    fn free_subtree<F>(&mut self, root: NodeId, mut release: F) -> Result<()>
    where
        F: FnMut(&mut V) -> Result<()>,
    {
        let mut freed = 0_usize;
        let mut current = root;
        loop {
            while let Some(child) = self.links(current)?.first_child {
                current = child;
            }

            if let Some(value) = self.node_mut(current)?.value.as_mut() {
                release(value).map_err(|error| {
                    tracing::debug!(node = ?current, freed, "release failed during free");
                    Error::callback("unable to free tree node value").caused_by(error)
                })?;
            }

            let links = self.links(current)?;
            match links.parent {
                Some(parent) if current != root => {
                    self.unlink(parent, current, links);
                    self.arena.remove(current);
                    freed += 1;
                    current = parent;
                }
                _ => {
                    self.arena.remove(current);
                    freed += 1;
                    tracing::trace!(node = ?root, freed, "freed tree");
                    return Ok(());
                }
            }
        }
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Clones the sub-tree rooted at `source` into a new tree of this forest.
    ///
    /// Values are copied with [`TryClone::try_clone`] and child order is kept.
    /// The copy is a root even if `source` is attached. A `None` source
    /// leaves `destination` as `None`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `destination`
    ///   already holds a handle or `source` is stale.
    /// - [`ErrorKind::AllocationFailure`](crate::ErrorKind) or
    ///   [`ErrorKind::CallbackFailure`](crate::ErrorKind) if a node or a value
    ///   cannot be created.
    ///
    /// On error every node created so far is released and removed, and
    /// `destination` stays `None`.
    pub fn clone_tree(
        &mut self,
        destination: &mut Option<NodeId>,
        source: Option<NodeId>,
    ) -> Result<()>
    where
        V: TryClone + Release,
    {
        if destination.is_some() {
            return Err(Error::invalid_argument(
                "invalid destination node - value already set",
            ));
        }
        let Some(source) = source else {
            return Ok(());
        };
        self.links(source)?;

        let mut root = None;
        match self.clone_nodes(source, &mut root) {
            Ok(()) => {
                *destination = root;
                Ok(())
            }
            Err(error) => Err(self.roll_back_clone(root, error)),
        }
    }

    fn clone_nodes(&mut self, source: NodeId, root: &mut Option<NodeId>) -> Result<()>
    where
        V: TryClone,
    {
        let mut pending: SmallVec<[(NodeId, Option<NodeId>); CLONE_WORK_INLINE]> =
            SmallVec::new();
        pending.push((source, None));

        while let Some((original, parent)) = pending.pop() {
            let copy = self.arena.insert(&self.allocation, None)?;
            match parent {
                Some(parent) => {
                    let previous = self.links(parent)?.last_child;
                    self.link(parent, copy, previous, None);
                }
                None => *root = Some(copy),
            }

            let original_node = self.node(original)?;
            let value = original_node
                .value
                .as_ref()
                .map(TryClone::try_clone)
                .transpose()
                .map_err(|error| {
                    Error::callback("unable to clone tree node value").caused_by(error)
                })?;
            let count = original_node.links.number_of_sub_nodes;
            let mut child = original_node.links.last_child;
            self.node_mut(copy)?.value = value;

            if count > 0 {
                self.allocation.try_reserve_inline(&mut pending, count)?;
            }
            // Reverse order, so the first child is popped first.
            while let Some(id) = child {
                pending.push((id, Some(copy)));
                child = self.links(id)?.previous_sibling;
            }
        }
        tracing::trace!(source = ?source, copy = ?root, "cloned tree");
        Ok(())
    }

    fn roll_back_clone(&mut self, root: Option<NodeId>, error: Error) -> Error
    where
        V: Release,
    {
        let Some(root) = root else {
            return error;
        };
        match self.free_subtree(root, Release::release) {
            Ok(()) => error,
            Err(rollback) => {
                tracing::warn!(node = ?root, %rollback, "release failed while rolling back clone");
                // Discard whatever is left without releasing it again.
                let discarded = self.free_subtree(root, |_| Ok(()));
                debug_assert!(discarded.is_ok());
                error.caused_by(rollback)
            }
        }
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    #[inline]
    fn node(&self, id: NodeId) -> Result<&NodeData<V>> {
        self.arena
            .get(id)
            .ok_or_else(|| Error::invalid_argument(format!("invalid tree node {id:?}")))
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData<V>> {
        self.arena
            .get_mut(id)
            .ok_or_else(|| Error::invalid_argument(format!("invalid tree node {id:?}")))
    }

    #[inline]
    fn links(&self, id: NodeId) -> Result<Links> {
        Ok(self.node(id)?.links)
    }

    /// Links of `child`, provided it is a child of `parent`.
    fn child_links(&self, parent: NodeId, child: NodeId) -> Result<Links> {
        self.links(parent)?;
        let links = self.links(child)?;
        if links.parent != Some(parent) {
            return Err(Error::invalid_argument(format!(
                "node {child:?} is not a sub node of {parent:?}"
            )));
        }
        Ok(links)
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.links(parent)?;
        let child_links = self.links(child)?;
        if !child_links.is_detached() {
            return Err(Error::invalid_argument(format!(
                "node {child:?} is already part of a tree"
            )));
        }

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(Error::invalid_argument(format!(
                    "node {child:?} cannot become a sub node of its own descendant {parent:?}"
                )));
            }
            ancestor = self.links(id)?.parent;
        }
        Ok(())
    }

    fn children_unchecked(&self, first: Option<NodeId>) -> Children<'_, V> {
        Children {
            arena: &self.arena,
            next: first,
        }
    }

    fn update_links(&mut self, id: NodeId, update: impl FnOnce(&mut Links)) {
        let node = self.arena.get_mut(id);
        debug_assert!(node.is_some(), "links of {id:?} updated after validation");
        if let Some(node) = node {
            update(&mut node.links);
        }
    }

    /// Splices a validated, detached `child` between `previous` and `next`.
    fn link(
        &mut self,
        parent: NodeId,
        child: NodeId,
        previous: Option<NodeId>,
        next: Option<NodeId>,
    ) {
        self.update_links(child, |links| {
            links.parent = Some(parent);
            links.previous_sibling = previous;
            links.next_sibling = next;
        });
        match previous {
            Some(previous) => self.update_links(previous, |links| links.next_sibling = Some(child)),
            None => self.update_links(parent, |links| links.first_child = Some(child)),
        }
        match next {
            Some(next) => self.update_links(next, |links| links.previous_sibling = Some(child)),
            None => self.update_links(parent, |links| links.last_child = Some(child)),
        }
        self.update_links(parent, |links| links.number_of_sub_nodes += 1);
    }

    /// Detaches a validated `child` whose current links are `links`.
    fn unlink(&mut self, parent: NodeId, child: NodeId, links: Links) {
        match links.previous_sibling {
            Some(previous) => {
                self.update_links(previous, |neighbour| {
                    neighbour.next_sibling = links.next_sibling;
                });
            }
            None => self.update_links(parent, |owner| owner.first_child = links.next_sibling),
        }
        match links.next_sibling {
            Some(next) => {
                self.update_links(next, |neighbour| {
                    neighbour.previous_sibling = links.previous_sibling;
                });
            }
            None => self.update_links(parent, |owner| owner.last_child = links.previous_sibling),
        }
        self.update_links(parent, |owner| {
            owner.number_of_sub_nodes = owner.number_of_sub_nodes.saturating_sub(1);
        });
        self.update_links(child, |detached| {
            detached.parent = None;
            detached.previous_sibling = None;
            detached.next_sibling = None;
        });
    }
}

/// Iterator over the direct children of a node.
///
/// Created by [`Forest::children`].
#[derive(Debug)]
pub struct Children<'a, V> {
    arena: &'a Arena<V>,
    next: Option<NodeId>,
}

impl<V> Iterator for Children<'_, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self
            .arena
            .get(current)
            .and_then(|node| node.links.next_sibling);
        Some(current)
    }
}

impl<V> FusedIterator for Children<'_, V> {}

static_assertions::assert_impl_all!(Forest<String>: Send, Sync);
