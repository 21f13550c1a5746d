use super::{CompleteChildSource, IndexedFilter, NodeFilter};
use crate::accumulator::ChildChangeAccumulator;
use crate::error::CoreResult;
use crate::query::QueryParams;
use canopy_snap::{ChildKey, Index, NamedNode, Node, Priority};
use std::cmp::Ordering;

/// Filter that keeps children between the query's start and end bounds.
///
/// Children outside the range are treated as empty.
#[derive(Debug, Clone)]
pub struct RangedFilter {
    indexed: IndexedFilter,
    index: Index,
    start: Option<NamedNode>,
    end: Option<NamedNode>,
}

impl RangedFilter {
    /// Creates the filter for `params`.
    pub fn new(params: &QueryParams) -> Self {
        Self {
            indexed: IndexedFilter::new(params.index().clone()),
            index: params.index().clone(),
            start: params.start_post(),
            end: params.end_post(),
        }
    }

    /// Returns true if `node` lies within the bounds.
    pub fn matches(&self, node: &NamedNode) -> bool {
        let after_start = self
            .start
            .as_ref()
            .map_or(true, |s| self.index.compare(s, node) != Ordering::Greater);
        let before_end = self
            .end
            .as_ref()
            .map_or(true, |e| self.index.compare(node, e) != Ordering::Greater);
        after_start && before_end
    }

    /// The unfiltered filter with the same index.
    pub fn indexed_filter(&self) -> &IndexedFilter {
        &self.indexed
    }

    /// Lowest bound, if any.
    pub fn start_post(&self) -> Option<&NamedNode> {
        self.start.as_ref()
    }

    /// Highest bound, if any.
    pub fn end_post(&self) -> Option<&NamedNode> {
        self.end.as_ref()
    }
}

impl NodeFilter for RangedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &ChildKey,
        new_child: Node,
        source: &dyn CompleteChildSource,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let new_child = if self.matches(&NamedNode::new(key.clone(), new_child.clone())) {
            new_child
        } else {
            Node::empty()
        };
        self.indexed.update_child(snap, key, new_child, source, acc)
    }

    fn update_full_node(
        &self,
        old: &Node,
        new: &Node,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let filtered = if new.is_leaf() {
            Node::empty()
        } else {
            let mut filtered = new.with_priority(None);
            for (key, child) in new.children() {
                if !self.matches(&NamedNode::new(key.clone(), child.clone())) {
                    filtered = filtered.update_immediate_child(key, Node::empty());
                }
            }
            filtered
        };
        self.indexed.update_full_node(old, &filtered, acc)
    }

    fn update_priority(&self, old: &Node, _priority: Option<Priority>) -> Node {
        old.clone()
    }

    fn filters_nodes(&self) -> bool {
        true
    }

    fn index(&self) -> &Index {
        &self.index
    }
}
