//! Query filters applied to cached snapshots.
//!
//! A filter turns incoming data into the snapshot a query should see and
//! reports the child changes it made to an optional accumulator:
//! - [`IndexedFilter`] keeps everything
//! - [`RangedFilter`] keeps children between the query bounds
//! - [`LimitedFilter`] keeps the first or last N children in range

mod indexed;
mod limited;
mod ranged;

pub use indexed::IndexedFilter;
pub use limited::LimitedFilter;
pub use ranged::RangedFilter;

use crate::accumulator::ChildChangeAccumulator;
use crate::error::CoreResult;
use canopy_snap::{ChildKey, Index, NamedNode, Node, Priority};
use std::fmt;

/// Supplies children that are not part of the snapshot being filtered.
///
/// Limited filters use it to find the child that slides into the window
/// when another one leaves.
pub trait CompleteChildSource {
    /// The first known child after `post` under `index`, searching backwards
    /// when `reverse` is set.
    fn child_after(&self, index: &Index, post: &NamedNode, reverse: bool) -> Option<NamedNode>;
}

/// A source that knows nothing beyond the snapshot itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompleteChildSource;

impl CompleteChildSource for NoCompleteChildSource {
    fn child_after(&self, _index: &Index, _post: &NamedNode, _reverse: bool) -> Option<NamedNode> {
        None
    }
}

/// Applies query restrictions to snapshot updates.
pub trait NodeFilter: fmt::Debug + Send + Sync {
    /// Replaces the child at `key` in `snap`, tracking the resulting child
    /// changes.
    fn update_child(
        &self,
        snap: &Node,
        key: &ChildKey,
        new_child: Node,
        source: &dyn CompleteChildSource,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node>;

    /// Replaces `old` with the filtered form of `new`, tracking the child
    /// differences.
    fn update_full_node(
        &self,
        old: &Node,
        new: &Node,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node>;

    /// Replaces the priority of `old`.
    fn update_priority(&self, old: &Node, priority: Option<Priority>) -> Node;

    /// Whether this filter may drop children.
    fn filters_nodes(&self) -> bool;

    /// The index children are ordered by.
    fn index(&self) -> &Index;
}
