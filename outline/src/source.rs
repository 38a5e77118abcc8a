//! Value identity and child-fetch configuration.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::LoadError;

/// A domain value that can appear in the outline.
///
/// The model never inspects values beyond these two projections. The ID must
/// be unique across the entire tree and stable across fetches so that
/// expansion and selection state keyed on it survives reloads.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone)]
/// struct Entry {
///     path: String,
///     is_dir: bool,
/// }
///
/// impl OutlineValue for Entry {
///     type Id = String;
///
///     fn id(&self) -> String {
///         self.path.clone()
///     }
///
///     fn has_children(&self) -> bool {
///         self.is_dir
///     }
/// }
/// ```
pub trait OutlineValue: Clone + Send + Sync + 'static {
    /// Stable identifier type for values of this kind.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Unique, stable identifier for this value.
    fn id(&self) -> Self::Id;

    /// Whether this value may have children.
    ///
    /// This is a cheap, synchronous hint; the authoritative answer comes from
    /// the fetch. A value reporting `true` here may still load zero children.
    fn has_children(&self) -> bool;
}

/// Provider of a value's children.
///
/// The fetch may suspend and may fail; its transport (filesystem, network,
/// database) is the implementor's concern. The model invokes it at most once
/// per node, from a spawned task, and applies the result itself — the fetch
/// body never touches tree state.
#[async_trait]
pub trait ChildSource<V: OutlineValue>: Send + Sync {
    /// Fetch the children of `value`, in display order.
    async fn children(&self, value: &V) -> Result<Vec<V>, LoadError>;
}
