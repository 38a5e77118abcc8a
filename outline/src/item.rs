//! Opaque row handles given to the tree widget.

/// A row handle: either a materialized node or the transient "loading…" row
/// shown under a node whose children are still being fetched.
///
/// The widget treats items as black boxes with identity. Equality and hashing
/// distinguish the variants, so a loading placeholder and a real node carrying
/// the same ID are different rows for diffing purposes — required because the
/// same ID transiently appears as a placeholder and, after the fetch lands, as
/// a different conceptual row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item<I> {
    /// A materialized node, keyed by its own ID.
    Node(I),
    /// The single synthetic loading row, keyed by its parent's ID.
    Loading(I),
}

impl<I> Item<I> {
    /// The ID this item is keyed by: the node's own ID, or the parent's ID for
    /// a loading placeholder.
    pub fn id(&self) -> &I {
        match self {
            Self::Node(id) | Self::Loading(id) => id,
        }
    }

    /// Check if this is the synthetic loading row.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }
}
