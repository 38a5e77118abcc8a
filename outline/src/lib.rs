//! Lazily-loaded outline tree model
//!
//! An async view model for outline (tree) widgets whose children are not known
//! up front but are fetched on demand the first time a node is expanded. The
//! model keeps the partially-materialized tree consistent while fetches race
//! against structural changes: each node loads at most once, results for a
//! discarded tree are detected as stale and dropped, and the consumer is told
//! exactly which subtree to re-query after every change.
//!
//! The widget side of the boundary is deliberately thin: the model answers
//! child-count / child-at-index / is-expandable queries keyed by opaque
//! [`Item`] handles, and reports changes through a single update handler.
//! Rendering, selection, and expansion-state persistence belong to the widget.

pub mod enumerate;
pub mod error;
pub mod item;
pub mod model;
pub mod node;
pub mod source;

pub use enumerate::{TreeView, enumerate_expanded_items, enumerate_items, rows_matching};
pub use error::LoadError;
pub use item::Item;
pub use model::{OutlineModel, Update};
pub use source::{ChildSource, OutlineValue};
