//! Depth-first walks over the widget's currently expanded structure.
//!
//! These operate on the widget's own view of the tree, not the model's: the
//! widget may show transient rows (placeholders) the model has since replaced,
//! and only the widget knows which items the user has expanded. Consumers use
//! the walks to mirror expansion and selection sets externally.

use std::collections::BTreeSet;

/// The structural surface of a rendered tree widget.
///
/// Expansion flags belong to the widget and are only queried here, never
/// owned. `child_count`/`child_at` report whatever rows the widget currently
/// has, including synthetic ones.
pub trait TreeView {
    /// Opaque row handle, cloned freely during walks.
    type Item: Clone;

    /// The root item. Always present; the root is visited whether or not it is
    /// expanded.
    fn root_item(&self) -> Self::Item;

    /// Whether the widget currently shows `item` expanded.
    ///
    /// Widgets whose top-level rows are always visible report the root as
    /// expanded; the walks recurse under whatever this returns.
    fn is_expanded(&self, item: &Self::Item) -> bool;

    /// Number of rows currently shown under `item`.
    fn child_count(&self, item: &Self::Item) -> usize;

    /// The row at `index` under `item`.
    fn child_at(&self, item: &Self::Item, index: usize) -> Self::Item;

    /// The flat row index of `item`, if it is currently visible.
    fn row_for(&self, item: &Self::Item) -> Option<usize>;
}

/// Every item the widget currently shows, in depth-first order.
///
/// The root is included unconditionally; children are visited only under
/// expanded items. Eager, one-shot walk.
pub fn enumerate_items<T: TreeView>(view: &T) -> Vec<T::Item> {
    let mut items = Vec::new();
    visit(view, view.root_item(), &mut |item| items.push(item.clone()));
    items
}

/// Only the expanded items, in the same depth-first order.
pub fn enumerate_expanded_items<T: TreeView>(view: &T) -> Vec<T::Item> {
    let mut items = Vec::new();
    visit(view, view.root_item(), &mut |item| {
        if view.is_expanded(item) {
            items.push(item.clone());
        }
    });
    items
}

/// Row indices of all visible items matching `predicate`.
pub fn rows_matching<T, P>(view: &T, predicate: P) -> BTreeSet<usize>
where
    T: TreeView,
    P: Fn(&T::Item) -> bool,
{
    let mut rows = BTreeSet::new();
    visit(view, view.root_item(), &mut |item| {
        if predicate(item)
            && let Some(row) = view.row_for(item)
        {
            rows.insert(row);
        }
    });
    rows
}

fn visit<T: TreeView>(view: &T, item: T::Item, block: &mut impl FnMut(&T::Item)) {
    block(&item);

    if !view.is_expanded(&item) {
        return;
    }

    let count = view.child_count(&item);
    for index in 0..count {
        visit(view, view.child_at(&item, index), block);
    }
}
