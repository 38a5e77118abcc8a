//! The tree cache: lazy loading orchestration and the structural query surface.

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;
use crate::item::Item;
use crate::node::{ChildState, LoadHandle, Node};
use crate::source::{ChildSource, OutlineValue};

/// What the widget should re-query after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<I> {
    /// The whole tree changed; reload visible structure from the root.
    Tree,
    /// Only this item's subtree changed.
    Item(Item<I>),
}

/// Handler invoked after every committed structural change.
pub type UpdateHandler<I> = Box<dyn FnMut(Update<I>) + Send>;

/// Result of one fetch, routed back to the owning context for application.
struct Completion<V: OutlineValue> {
    epoch: u64,
    node_id: V::Id,
    result: Result<Vec<V>, LoadError>,
}

/// View model for a lazily-loaded outline tree.
///
/// All state lives behind `&mut self`: structural queries, root swaps, and
/// completion application are serialized by the borrow checker, which is the
/// single-writer discipline the loading protocol relies on. Fetch tasks only
/// ever produce a result list over the completion channel; they never touch
/// node state.
///
/// Fetches are spawned with [`tokio::spawn`], so queries that can trigger a
/// load ([`child_count`](Self::child_count)) must run inside a runtime.
/// Completions are applied only when the owner calls
/// [`process_completions`](Self::process_completions) or
/// [`next_completion`](Self::next_completion).
pub struct OutlineModel<V: OutlineValue> {
    root: Node<V>,
    source: Arc<dyn ChildSource<V>>,
    /// Bumped on every root replacement; completions from older epochs are
    /// stale by definition.
    epoch: u64,
    completions_tx: mpsc::UnboundedSender<Completion<V>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<V>>,
    update_handler: Option<UpdateHandler<V::Id>>,
}

impl<V: OutlineValue> OutlineModel<V> {
    /// Create a model rooted at `root`, fetching children from `source`.
    pub fn new(root: V, source: Arc<dyn ChildSource<V>>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            root: Node::new(root),
            source,
            epoch: 0,
            completions_tx,
            completions_rx,
            update_handler: None,
        }
    }

    /// Install the single change-notification handler.
    pub fn set_update_handler(&mut self, handler: impl FnMut(Update<V::Id>) + Send + 'static) {
        self.update_handler = Some(Box::new(handler));
    }

    /// Replace the fetch configuration. In-flight fetches keep the source they
    /// were spawned with.
    pub fn set_source(&mut self, source: Arc<dyn ChildSource<V>>) {
        self.source = source;
    }

    /// The root value.
    pub fn root(&self) -> &V {
        self.root.value()
    }

    /// The root node's ID.
    pub fn root_id(&self) -> &V::Id {
        self.root.id()
    }

    /// The root as an item handle.
    pub fn root_item(&self) -> Item<V::Id> {
        Item::Node(self.root.id().clone())
    }

    /// The ID an item is keyed by. Total; never fails.
    pub fn id_for<'a>(&self, item: &'a Item<V::Id>) -> &'a V::Id {
        item.id()
    }

    /// The value behind a node item, for rendering. `None` for placeholders.
    pub fn value(&self, item: &Item<V::Id>) -> Option<&V> {
        match item {
            Item::Node(id) => self.root.find(id).map(Node::value),
            Item::Loading(_) => None,
        }
    }

    /// Number of children the widget should show under `item`.
    ///
    /// Placeholders and values whose predicate says "no children" report 0.
    /// A node that has never been asked before starts its fetch here; while
    /// the fetch is in flight the count is exactly 1 (the placeholder row).
    /// Once loaded the materialized count is authoritative — an empty result
    /// collapses the expansion on the widget's next query. A failed load
    /// reports 0 until [`retry`](Self::retry).
    pub fn child_count(&mut self, item: &Item<V::Id>) -> usize {
        let Item::Node(id) = item else {
            return 0;
        };

        let Some(node) = self.root.find_mut(id) else {
            panic!("unknown item {id:?}: widget out of sync with model");
        };

        if !node.value().has_children() {
            return 0;
        }

        if matches!(node.children, ChildState::Unknown) {
            let handle = spawn_fetch(
                node.value().clone(),
                id.clone(),
                self.epoch,
                Arc::clone(&self.source),
                self.completions_tx.clone(),
            );
            node.children = ChildState::Loading(handle);
        }

        match &node.children {
            ChildState::Unknown => unreachable!("fetch was just started"),
            ChildState::Loading(_) => 1,
            ChildState::Loaded(children) => children.len(),
            ChildState::Failed(_) => 0,
        }
    }

    /// The child of `item` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `item` is a placeholder, if the model has no node for it, or
    /// if `index` is out of range — all of these mean the widget and the model
    /// have desynchronized.
    pub fn child(&self, item: &Item<V::Id>, index: usize) -> Item<V::Id> {
        let Item::Node(id) = item else {
            panic!("loading placeholders have no children");
        };
        let node = self.node(id);

        match &node.children {
            ChildState::Unknown | ChildState::Loading(_) => {
                assert!(index == 0, "only one placeholder child while loading");
                Item::Loading(node.id().clone())
            }
            ChildState::Loaded(children) => {
                assert!(
                    index < children.len(),
                    "child index {index} out of range for {} loaded children",
                    children.len()
                );
                Item::Node(children[index].id().clone())
            }
            ChildState::Failed(_) => panic!("failed nodes have no children"),
        }
    }

    /// Whether the widget should show an expansion control for `item`.
    ///
    /// A loading node is already committed to having content; otherwise the
    /// value's own predicate decides. Placeholders and failed nodes are never
    /// expandable.
    pub fn is_expandable(&self, item: &Item<V::Id>) -> bool {
        let Item::Node(id) = item else {
            return false;
        };
        let node = self.node(id);

        match &node.children {
            ChildState::Loading(_) => true,
            ChildState::Failed(_) => false,
            ChildState::Unknown | ChildState::Loaded(_) => node.value().has_children(),
        }
    }

    /// Replace the root value.
    ///
    /// If the new value's ID matches the current root's this is a no-op, so
    /// re-supplying logically-identical data from a refreshed upstream source
    /// keeps the user's loaded subtrees and expansion progress. A different ID
    /// replaces the whole tree with a fresh unloaded root and fires
    /// [`Update::Tree`]. Fetches belonging to the discarded tree are cancelled
    /// by their handles' drop and their completions fail the staleness check.
    pub fn set_root(&mut self, root: V) {
        if root.id() == *self.root.id() {
            return;
        }

        self.epoch += 1;
        self.root = Node::new(root);
        log::debug!("root replaced, now {:?} (epoch {})", self.root.id(), self.epoch);
        self.notify(Update::Tree);
    }

    /// The load failure for `item`, if its last fetch failed.
    pub fn load_error(&self, item: &Item<V::Id>) -> Option<&LoadError> {
        let Item::Node(id) = item else {
            return None;
        };
        match &self.node(id).children {
            ChildState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Re-arm a failed node so the next structural query fetches again.
    ///
    /// Returns whether anything changed; only nodes in the failed state can be
    /// retried. Fires an update so the widget re-queries the subtree.
    pub fn retry(&mut self, item: &Item<V::Id>) -> bool {
        let Item::Node(id) = item else {
            return false;
        };
        let is_root = *id == *self.root.id();
        let node = self.node_mut(id);

        if !matches!(node.children, ChildState::Failed(_)) {
            return false;
        }
        node.children = ChildState::Unknown;

        let update = if is_root {
            Update::Tree
        } else {
            Update::Item(Item::Node(id.clone()))
        };
        self.notify(update);
        true
    }

    /// Apply every completion that has already arrived, without blocking.
    ///
    /// Returns the number of completions that actually mutated the tree;
    /// stale completions are drained and discarded silently.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Await the next completion and apply it.
    ///
    /// Returns whether it mutated the tree (`false` for a stale completion).
    /// Pends forever if no fetch is in flight.
    pub async fn next_completion(&mut self) -> bool {
        match self.completions_rx.recv().await {
            Some(completion) => self.apply(completion),
            // Unreachable in practice: the model holds a sender.
            None => false,
        }
    }

    /// Apply one fetch result under the single-writer context.
    ///
    /// The staleness check here is authoritative, independent of whether the
    /// fetch body observed its cancellation token: a completion from an older
    /// epoch, for a node no longer reachable from the current root, for a node
    /// not in the loading state, or whose token was cancelled, is discarded
    /// without mutating or notifying.
    fn apply(&mut self, completion: Completion<V>) -> bool {
        if completion.epoch != self.epoch {
            log::debug!("discarding stale fetch for {:?} (old epoch)", completion.node_id);
            return false;
        }

        let is_root = completion.node_id == *self.root.id();
        let Some(node) = self.root.find_mut(&completion.node_id) else {
            log::debug!("discarding fetch for unreachable node {:?}", completion.node_id);
            return false;
        };
        let ChildState::Loading(handle) = &node.children else {
            log::debug!("discarding fetch for {:?}: not loading", completion.node_id);
            return false;
        };
        if handle.token().is_cancelled() {
            log::debug!("discarding cancelled fetch for {:?}", completion.node_id);
            return false;
        }

        match completion.result {
            Ok(values) => {
                let children: Vec<_> = values.into_iter().map(Node::new).collect();
                log::debug!(
                    "loaded {} children for {:?}",
                    children.len(),
                    completion.node_id
                );
                node.children = ChildState::Loaded(children);
            }
            Err(err) => {
                log::warn!("child fetch failed for {:?}: {err}", completion.node_id);
                node.children = ChildState::Failed(err);
            }
        }

        let update = if is_root {
            Update::Tree
        } else {
            Update::Item(Item::Node(completion.node_id))
        };
        self.notify(update);
        true
    }

    fn notify(&mut self, update: Update<V::Id>) {
        if let Some(handler) = &mut self.update_handler {
            handler(update);
        }
    }

    fn node(&self, id: &V::Id) -> &Node<V> {
        self.root
            .find(id)
            .unwrap_or_else(|| panic!("unknown item {id:?}: widget out of sync with model"))
    }

    fn node_mut(&mut self, id: &V::Id) -> &mut Node<V> {
        self.root
            .find_mut(id)
            .unwrap_or_else(|| panic!("unknown item {id:?}: widget out of sync with model"))
    }
}

impl<V: OutlineValue> OutlineModel<V>
where
    V::Id: Display,
{
    /// Opaque key for widget-side persistence of expansion state, stable for a
    /// given root ID. The model itself persists nothing.
    pub fn persistence_key(&self) -> String {
        format!("outline-{}", self.root.id())
    }
}

/// Spawn one fetch task for a node.
///
/// The task races the caller-supplied fetch against its cancellation token and
/// sends the outcome back over the completion channel. It holds only the
/// cloned value, the node's ID, and the epoch it was spawned under — never a
/// reference into the tree.
fn spawn_fetch<V: OutlineValue>(
    value: V,
    node_id: V::Id,
    epoch: u64,
    source: Arc<dyn ChildSource<V>>,
    tx: mpsc::UnboundedSender<Completion<V>>,
) -> LoadHandle {
    let token = CancellationToken::new();
    let task_token = token.clone();
    log::debug!("fetching children for {node_id:?}");

    let task = tokio::spawn(async move {
        let result = tokio::select! {
            // Checked first so a token cancelled while the fetch was parked
            // never steals resources from a live fetch.
            biased;
            _ = task_token.cancelled() => {
                log::debug!("child fetch cancelled for {node_id:?}");
                return;
            }
            result = source.children(&value) => result,
        };

        // Receiver gone means the model itself was dropped.
        let _ = tx.send(Completion {
            epoch,
            node_id,
            result,
        });
    });

    LoadHandle::new(token, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct Val {
        id: &'static str,
        branch: bool,
    }

    struct NoChildren;

    #[async_trait]
    impl ChildSource<Val> for NoChildren {
        async fn children(&self, _value: &Val) -> Result<Vec<Val>, LoadError> {
            Ok(vec![])
        }
    }

    impl OutlineValue for Val {
        type Id = &'static str;

        fn id(&self) -> &'static str {
            self.id
        }

        fn has_children(&self) -> bool {
            self.branch
        }
    }

    fn model(root_id: &'static str) -> OutlineModel<Val> {
        OutlineModel::new(
            Val {
                id: root_id,
                branch: true,
            },
            Arc::new(NoChildren),
        )
    }

    #[test]
    fn test_same_id_root_swap_is_a_noop() {
        let mut model = model("r");
        let fired = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = fired.clone();
        model.set_update_handler(move |update| sink.lock().unwrap().push(update));

        model.set_root(Val {
            id: "r",
            branch: true,
        });
        assert!(
            fired.lock().unwrap().is_empty(),
            "same-ID root swap must not notify"
        );
        assert_eq!(*model.root_id(), "r");
    }

    #[test]
    fn test_new_id_root_swap_fires_whole_tree_update() {
        let mut model = model("r");
        let fired = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = fired.clone();
        model.set_update_handler(move |update| sink.lock().unwrap().push(update));

        model.set_root(Val {
            id: "s",
            branch: true,
        });
        assert_eq!(*model.root_id(), "s");
        assert_eq!(fired.lock().unwrap().as_slice(), &[Update::Tree]);
    }

    #[test]
    fn test_leaf_values_report_zero_children_without_fetching() {
        // No runtime here: a childless-by-predicate value must never spawn.
        let mut model = OutlineModel::new(
            Val {
                id: "leaf",
                branch: false,
            },
            Arc::new(NoChildren),
        );
        let root = model.root_item();
        assert_eq!(model.child_count(&root), 0);
        assert!(!model.is_expandable(&root));
    }

    #[test]
    fn test_placeholder_queries() {
        let model = model("r");
        let placeholder = Item::Loading("r");
        assert!(!model.is_expandable(&placeholder));
        assert!(model.value(&placeholder).is_none());
        assert_eq!(*model.id_for(&placeholder), "r");
    }

    #[test]
    fn test_persistence_key_tracks_root_id() {
        let mut model = model("r");
        assert_eq!(model.persistence_key(), "outline-r");
        model.set_root(Val {
            id: "s",
            branch: true,
        });
        assert_eq!(model.persistence_key(), "outline-s");
    }

    #[test]
    #[should_panic(expected = "loading placeholders have no children")]
    fn test_child_of_placeholder_panics() {
        let model = model("r");
        let _ = model.child(&Item::Loading("r"), 0);
    }
}
