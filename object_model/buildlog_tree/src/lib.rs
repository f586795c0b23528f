//! Contains the tree-node abstraction shared by every object of the build log
//! model.
//!
//! A node carries a [`TimedNode`] header holding its identity, its display
//! name, its timing information and a non-owning reference to its parent. The
//! tree structure itself is owned by the [`Container`]s: a container keeps its
//! children alive while a child only remembers the [`NodeID`] of the container
//! holding it.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Represents an identifier of a node in the build log tree.
///
/// Identifiers are handed out in creation order; a node created later always
/// has a greater identifier than the nodes created before it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display(fmt = "#{}", _0)]
pub struct NodeID(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeID {
    /// Allocates a new identifier that has never been handed out before in
    /// this process.
    #[must_use]
    pub fn fresh() -> Self { Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Returns the raw value of the identifier.
    #[must_use]
    pub const fn index(&self) -> u64 { self.0 }
}

/// The header that every node in the tree carries.
#[derive(Debug)]
pub struct TimedNode {
    id: NodeID,
    name: String,
    parent: RwLock<Option<NodeID>>,
    start_time: RwLock<Option<SystemTime>>,
    end_time: RwLock<Option<SystemTime>>,
}

impl TimedNode {
    /// Creates a new unattached header with a fresh [`NodeID`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeID::fresh(),
            name: name.into(),
            parent: RwLock::new(None),
            start_time: RwLock::new(None),
            end_time: RwLock::new(None),
        }
    }

    /// Returns the identifier of the node.
    #[must_use]
    pub const fn id(&self) -> NodeID { self.id }

    /// Returns the display name of the node.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Returns the identifier of the container currently holding this node.
    ///
    /// # Returns
    ///
    /// Returns `None` if the node hasn't been attached anywhere yet.
    #[must_use]
    pub fn parent(&self) -> Option<NodeID> { *self.parent.read() }

    /// Returns `true` if the node hasn't been attached to any container.
    #[must_use]
    pub fn is_rootless(&self) -> bool { self.parent.read().is_none() }

    /// Records `parent` as the parent of this node if it has none.
    ///
    /// Returns the existing parent if the slot was already taken.
    fn try_set_parent(&self, parent: NodeID) -> Result<(), NodeID> {
        let mut slot = self.parent.write();

        match *slot {
            Some(existing) => Err(existing),
            None => {
                *slot = Some(parent);
                Ok(())
            }
        }
    }

    /// Returns the time at which the node started.
    #[must_use]
    pub fn start_time(&self) -> Option<SystemTime> { *self.start_time.read() }

    /// Sets the time at which the node started.
    pub fn set_start_time(&self, time: SystemTime) {
        *self.start_time.write() = Some(time);
    }

    /// Returns the time at which the node finished.
    #[must_use]
    pub fn end_time(&self) -> Option<SystemTime> { *self.end_time.read() }

    /// Sets the time at which the node finished.
    pub fn set_end_time(&self, time: SystemTime) {
        *self.end_time.write() = Some(time);
    }

    /// Returns the elapsed time between the start and the end of the node.
    ///
    /// # Returns
    ///
    /// Returns `None` if either of the times is unknown or if the end time
    /// precedes the start time.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_time()?;
        let end = self.end_time()?;

        end.duration_since(start).ok()
    }
}

/// Implemented by every object that is part of the build log tree.
pub trait Node {
    /// Returns the header of the node.
    fn timed(&self) -> &TimedNode;
}

/// Errors that can occur when attaching a node to a [`Container`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    thiserror::Error,
    displaydoc::Display,
)]
pub enum AttachError {
    /// node {child} is already attached to node {parent}
    AlreadyAttached {
        /// The node that was being attached.
        child: NodeID,

        /// The container that already holds the node.
        parent: NodeID,
    },

    /// node {0} cannot be attached to itself
    SelfAttachment(NodeID),
}

/// An ordered list of child nodes owned by a [`Container`].
#[derive(Debug)]
pub struct Children<T> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T> Default for Children<T> {
    fn default() -> Self { Self { items: RwLock::new(Vec::new()) } }
}

impl<T> Children<T> {
    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize { self.items.read().len() }

    /// Returns `true` if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.read().is_empty() }

    /// Returns the child at the given position in attachment order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    /// Returns a copy of the children list in attachment order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> { self.items.read().clone() }
}

/// A node that owns a list of child nodes.
pub trait Container: Node {
    /// The type of the nodes this container holds.
    type Child: Node;

    /// Returns the children of this container.
    fn children(&self) -> &Children<Self::Child>;

    /// Attaches `child` as the last child of this container and records this
    /// container as its parent.
    ///
    /// # Errors
    ///
    /// See [`AttachError`] for possible errors. The child is left untouched
    /// when an error is returned.
    fn add_child(&self, child: Arc<Self::Child>) -> Result<(), AttachError> {
        let parent_id = self.timed().id();
        let child_id = child.timed().id();

        if parent_id == child_id {
            return Err(AttachError::SelfAttachment(child_id));
        }

        // the parent slot is the arbiter; the loser of a racing attachment
        // never touches the list
        child.timed().try_set_parent(parent_id).map_err(|parent| {
            AttachError::AlreadyAttached { child: child_id, parent }
        })?;

        self.children().items.write().push(child);

        Ok(())
    }
}

#[cfg(test)]
mod test;
