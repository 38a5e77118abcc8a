//! Tree cells and their child-loading state.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;
use crate::source::OutlineValue;

/// Handle to an in-flight child fetch.
///
/// Carries no ownership of the fetch result; the result travels back to the
/// model over its completion channel. Dropping the handle (root swap, ancestor
/// replacement) cancels the token so the task can stop doing useful work, but
/// the authoritative staleness check still happens when the completion is
/// applied.
#[derive(Debug)]
pub struct LoadHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LoadHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    /// Token observed by the fetch task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the underlying task has finished (completed or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Loading state of a node's children.
///
/// Transitions are driven only by the model: `Unknown → Loading`, then
/// `Loading → Loaded` or `Loading → Failed`. A node never regresses except
/// through an explicit retry (`Failed → Unknown`) or by being replaced
/// wholesale when an ancestor reloads.
#[derive(Debug, Default)]
pub enum ChildState<V: OutlineValue> {
    /// No fetch attempted yet.
    #[default]
    Unknown,
    /// A fetch is in flight.
    Loading(LoadHandle),
    /// Fetch completed; this list is authoritative and owned by the node.
    Loaded(Vec<Node<V>>),
    /// Fetch failed; terminal until explicitly retried.
    Failed(LoadError),
}

impl<V: OutlineValue> ChildState<V> {
    /// Check if a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Check if children are materialized.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// A single tree cell: a value, its stable ID, and its children state.
///
/// Each node exclusively owns its loaded children; the tree is a tree, not a
/// graph. All nodes are reachable only through the model's root.
#[derive(Debug)]
pub struct Node<V: OutlineValue> {
    value: V,
    id: V::Id,
    pub(crate) children: ChildState<V>,
}

impl<V: OutlineValue> Node<V> {
    /// Create a node with unknown children. The ID is derived once and never
    /// changes.
    pub fn new(value: V) -> Self {
        let id = value.id();
        Self {
            value,
            id,
            children: ChildState::Unknown,
        }
    }

    /// The node's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The node's immutable ID.
    pub fn id(&self) -> &V::Id {
        &self.id
    }

    /// Current children state.
    pub fn children(&self) -> &ChildState<V> {
        &self.children
    }

    /// Find the node with `id` in the materialized part of this subtree.
    pub(crate) fn find(&self, id: &V::Id) -> Option<&Node<V>> {
        if &self.id == id {
            return Some(self);
        }
        if let ChildState::Loaded(children) = &self.children {
            return children.iter().find_map(|child| child.find(id));
        }
        None
    }

    pub(crate) fn find_mut(&mut self, id: &V::Id) -> Option<&mut Node<V>> {
        if &self.id == id {
            return Some(self);
        }
        if let ChildState::Loaded(children) = &mut self.children {
            return children.iter_mut().find_map(|child| child.find_mut(id));
        }
        None
    }
}
