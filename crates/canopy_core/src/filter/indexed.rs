use super::{CompleteChildSource, NodeFilter};
use crate::accumulator::ChildChangeAccumulator;
use crate::change::Change;
use crate::error::CoreResult;
use canopy_snap::{ChildKey, Index, Node, Priority};

/// Filter that keeps every child; it only tracks changes.
#[derive(Debug, Clone)]
pub struct IndexedFilter {
    index: Index,
}

impl IndexedFilter {
    /// Creates a filter ordering children by `index`.
    pub fn new(index: Index) -> Self {
        Self { index }
    }
}

impl NodeFilter for IndexedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &ChildKey,
        new_child: Node,
        _source: &dyn CompleteChildSource,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let old_child = snap.immediate_child(key);
        if old_child.same_as(&new_child) {
            return Ok(snap.clone());
        }
        if let Some(acc) = acc {
            if new_child.is_empty() {
                if snap.has_child(key) {
                    acc.track_child_change(Change::child_removed(key.clone(), old_child))?;
                }
            } else if old_child.is_empty() {
                acc.track_child_change(Change::child_added(key.clone(), new_child.clone()))?;
            } else {
                acc.track_child_change(Change::child_changed(
                    key.clone(),
                    new_child.clone(),
                    old_child,
                ))?;
            }
        }
        if snap.is_leaf() && new_child.is_empty() {
            return Ok(snap.clone());
        }
        Ok(snap.update_immediate_child(key, new_child))
    }

    fn update_full_node(
        &self,
        old: &Node,
        new: &Node,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        if let Some(acc) = acc {
            for (key, child) in old.children() {
                if !new.has_child(key) {
                    acc.track_child_change(Change::child_removed(key.clone(), child.clone()))?;
                }
            }
            for (key, child) in new.children() {
                let old_child = old.immediate_child(key);
                if old_child.is_empty() {
                    acc.track_child_change(Change::child_added(key.clone(), child.clone()))?;
                } else if !old_child.same_as(child) {
                    acc.track_child_change(Change::child_changed(
                        key.clone(),
                        child.clone(),
                        old_child,
                    ))?;
                }
            }
        }
        Ok(new.clone())
    }

    fn update_priority(&self, old: &Node, priority: Option<Priority>) -> Node {
        old.with_priority(priority)
    }

    fn filters_nodes(&self) -> bool {
        false
    }

    fn index(&self) -> &Index {
        &self.index
    }
}
