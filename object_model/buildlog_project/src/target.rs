//! Contains the definition of [`Target`].

use std::sync::atomic::{AtomicI32, Ordering};

use buildlog_tree::{Children, Container, Node, NodeID, TimedNode};
use derive_more::Deref;
use parking_lot::RwLock;

/// Represents one execution of a build target within a project.
///
/// A target is identified by its case-insensitive name and, once the log
/// reveals it, by a numeric id. Targets are always handed out behind an
/// [`std::sync::Arc`] by the [`crate::registry::TargetRegistry`]; every
/// mutable piece of state is therefore interior.
#[derive(Debug, Deref)]
pub struct Target {
    #[deref]
    node: TimedNode,

    id: AtomicI32,
    succeeded: RwLock<Option<bool>>,
    children: Children<Target>,
}

impl Target {
    /// The id of a target whose id hasn't been seen in the log yet.
    pub const UNASSIGNED_ID: i32 = -1;

    pub(crate) fn new(name: &str) -> Self {
        Self {
            node: TimedNode::new(name),
            id: AtomicI32::new(Self::UNASSIGNED_ID),
            succeeded: RwLock::new(None),
            children: Children::default(),
        }
    }

    /// Returns the identifier of the target in the build log tree.
    #[must_use]
    pub const fn node_id(&self) -> NodeID { self.node.id() }

    /// Returns the raw id of the target, which might be
    /// [`Self::UNASSIGNED_ID`].
    #[must_use]
    pub fn id(&self) -> i32 { self.id.load(Ordering::Acquire) }

    /// Returns the id of the target if it has been assigned.
    #[must_use]
    pub fn confirmed_id(&self) -> Option<i32> {
        Some(self.id()).filter(|x| *x != Self::UNASSIGNED_ID)
    }

    /// Sets the id of the target.
    ///
    /// This only updates the target itself; the id index of the owning
    /// registry picks the new id up lazily on the next
    /// [`crate::registry::TargetRegistry::get_by_id`].
    pub fn set_id(&self, id: i32) { self.id.store(id, Ordering::Release); }

    /// Returns whether the target succeeded, if it has finished.
    #[must_use]
    pub fn succeeded(&self) -> Option<bool> { *self.succeeded.read() }

    /// Records the outcome of the target.
    pub fn set_succeeded(&self, succeeded: bool) {
        *self.succeeded.write() = Some(succeeded);
    }
}

impl Node for Target {
    fn timed(&self) -> &TimedNode { &self.node }
}

impl Container for Target {
    type Child = Self;

    fn children(&self) -> &Children<Self> { &self.children }
}
