//! Slot storage backing [`Forest`](super::Forest).
//!
//! Nodes live in a `Vec` of slots. A freed slot is put on a vacancy list and
//! its generation is bumped, so a [`NodeId`] taken before the free no longer
//! resolves once the slot is reused.

use std::fmt;

use crate::allocation::AllocationStrategy;
use crate::error::{Error, Result};

/// Handle to a node stored in a [`Forest`](super::Forest).
///
/// A handle is only meaningful for the forest that created it. Handles of
/// freed nodes are rejected with
/// [`ErrorKind::InvalidArgument`](crate::ErrorKind).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Position of the node's slot.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the node's slot when the handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// For compact printing.
impl fmt::Debug for NodeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "NodeId({}v{})", self.index, self.generation)
    }
}

/// Structural links of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) parent: Option<NodeId>,
    pub(crate) previous_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) number_of_sub_nodes: usize,
}

impl Links {
    /// A root has no parent and no siblings.
    #[inline]
    pub(crate) const fn is_detached(&self) -> bool {
        self.parent.is_none() && self.previous_sibling.is_none() && self.next_sibling.is_none()
    }
}

#[derive(Debug)]
pub(crate) struct NodeData<V> {
    pub(crate) value: Option<V>,
    pub(crate) links: Links,
}

#[derive(Debug)]
enum Slot<V> {
    Occupied {
        generation: u32,
        node: NodeData<V>,
    },
    Vacant {
        generation: u32,
        next_vacant: Option<u32>,
    },
}

#[derive(Debug)]
pub(crate) struct Arena<V> {
    slots: Vec<Slot<V>>,
    first_vacant: Option<u32>,
    len: usize,
}

impl<V> Arena<V> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            first_vacant: None,
            len: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Stores a detached node. Every call is one allocation request.
    pub(crate) fn insert<A: AllocationStrategy>(
        &mut self,
        allocation: &A,
        value: Option<V>,
    ) -> Result<NodeId> {
        let additional = usize::from(self.first_vacant.is_none());
        allocation.try_reserve(&mut self.slots, additional)?;

        let node = NodeData {
            value,
            links: Links::default(),
        };

        if let Some(index) = self.first_vacant {
            let slot = &mut self.slots[index as usize];
            let Slot::Vacant {
                generation,
                next_vacant,
            } = *slot
            else {
                return Err(Error::invalid_argument("vacancy list points at a live node"));
            };
            let generation = generation.wrapping_add(1);
            *slot = Slot::Occupied { generation, node };
            self.first_vacant = next_vacant;
            self.len += 1;
            return Ok(NodeId { index, generation });
        }

        let index = u32::try_from(self.slots.len())
            .map_err(|_| Error::allocation("node index space exhausted"))?;
        self.slots.push(Slot::Occupied {
            generation: 0,
            node,
        });
        self.len += 1;
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    /// Frees the slot of `id`, returning its node.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<NodeData<V>> {
        let slot = self.slots.get_mut(id.index())?;
        if !matches!(slot, Slot::Occupied { generation, .. } if *generation == id.generation) {
            return None;
        }
        let vacant = Slot::Vacant {
            generation: id.generation,
            next_vacant: self.first_vacant,
        };
        let Slot::Occupied { node, .. } = std::mem::replace(slot, vacant) else {
            return None;
        };
        self.first_vacant = Some(id.index);
        self.len -= 1;
        Some(node)
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&NodeData<V>> {
        match self.slots.get(id.index())? {
            Slot::Occupied { generation, node } if *generation == id.generation => Some(node),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData<V>> {
        match self.slots.get_mut(id.index())? {
            Slot::Occupied { generation, node } if *generation == id.generation => Some(node),
            _ => None,
        }
    }
}
