use super::{CompleteChildSource, NodeFilter, RangedFilter};
use crate::accumulator::ChildChangeAccumulator;
use crate::change::Change;
use crate::error::CoreResult;
use crate::query::{Limit, QueryParams};
use canopy_snap::{ChildKey, Index, NamedNode, Node, Priority};
use std::cmp::Ordering;

/// Filter that keeps a window of the first or last N children in range.
///
/// When the window is full, a child entering it evicts the child at the far
/// edge, and a child leaving it is replaced by the next child the
/// [`CompleteChildSource`] knows about.
#[derive(Debug, Clone)]
pub struct LimitedFilter {
    ranged: RangedFilter,
    index: Index,
    limit: usize,
    reverse: bool,
}

impl LimitedFilter {
    /// Creates the filter for `params` and its `limit`.
    pub fn new(params: &QueryParams, limit: Limit) -> Self {
        Self {
            ranged: RangedFilter::new(params),
            index: params.index().clone(),
            limit: limit.count(),
            reverse: matches!(limit, Limit::Last(_)),
        }
    }

    /// Compares in window order: the window keeps the lowest children.
    fn window_compare(&self, a: &NamedNode, b: &NamedNode) -> Ordering {
        if self.reverse {
            self.index.compare(b, a)
        } else {
            self.index.compare(a, b)
        }
    }

    /// Children of `snap` in window order.
    fn window(&self, snap: &Node) -> Vec<NamedNode> {
        let mut sorted = snap.sorted_children(&self.index);
        if self.reverse {
            sorted.reverse();
        }
        sorted
    }

    fn update_full_window(
        &self,
        snap: &Node,
        key: &ChildKey,
        new_child: Node,
        source: &dyn CompleteChildSource,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let Some(window_end) = self.window(snap).pop() else {
            return Ok(snap.clone());
        };
        let incoming = NamedNode::new(key.clone(), new_child.clone());

        if snap.has_child(key) {
            let old_child = snap.immediate_child(key);
            let mut next = source.child_after(&self.index, &window_end, self.reverse);
            while let Some(candidate) = next.take() {
                if &candidate.name == key || snap.has_child(&candidate.name) {
                    next = source.child_after(&self.index, &candidate, self.reverse);
                } else {
                    next = Some(candidate);
                    break;
                }
            }
            let stays = !new_child.is_empty()
                && next
                    .as_ref()
                    .map_or(true, |n| self.window_compare(n, &incoming) != Ordering::Less);
            if stays {
                if let Some(acc) = acc {
                    acc.track_child_change(Change::child_changed(
                        key.clone(),
                        new_child.clone(),
                        old_child,
                    ))?;
                }
                return Ok(snap.update_immediate_child(key, new_child));
            }

            let shrunk = snap.update_immediate_child(key, Node::empty());
            let replacement = next.filter(|n| self.ranged.matches(n));
            if let Some(acc) = acc {
                acc.track_child_change(Change::child_removed(key.clone(), old_child))?;
                if let Some(n) = &replacement {
                    acc.track_child_change(Change::child_added(n.name.clone(), n.node.clone()))?;
                }
            }
            return Ok(match replacement {
                Some(n) => shrunk.update_immediate_child(&n.name, n.node),
                None => shrunk,
            });
        }

        if new_child.is_empty() {
            return Ok(snap.clone());
        }
        if self.window_compare(&window_end, &incoming) == Ordering::Greater {
            if let Some(acc) = acc {
                acc.track_child_change(Change::child_removed(
                    window_end.name.clone(),
                    window_end.node.clone(),
                ))?;
                acc.track_child_change(Change::child_added(key.clone(), new_child.clone()))?;
            }
            return Ok(snap
                .update_immediate_child(key, new_child)
                .update_immediate_child(&window_end.name, Node::empty()));
        }
        Ok(snap.clone())
    }
}

impl NodeFilter for LimitedFilter {
    fn update_child(
        &self,
        snap: &Node,
        key: &ChildKey,
        new_child: Node,
        source: &dyn CompleteChildSource,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let new_child = if self.ranged.matches(&NamedNode::new(key.clone(), new_child.clone())) {
            new_child
        } else {
            Node::empty()
        };
        if snap.immediate_child(key).same_as(&new_child) {
            return Ok(snap.clone());
        }
        if snap.num_children() < self.limit {
            return self
                .ranged
                .indexed_filter()
                .update_child(snap, key, new_child, source, acc);
        }
        self.update_full_window(snap, key, new_child, source, acc)
    }

    fn update_full_node(
        &self,
        old: &Node,
        new: &Node,
        acc: Option<&mut ChildChangeAccumulator>,
    ) -> CoreResult<Node> {
        let filtered = if new.is_leaf() || new.is_empty() {
            Node::empty()
        } else {
            let mut filtered = new.with_priority(None);
            let mut kept = 0;
            for child in self.window(new) {
                if kept < self.limit && self.ranged.matches(&child) {
                    kept += 1;
                } else {
                    filtered = filtered.update_immediate_child(&child.name, Node::empty());
                }
            }
            filtered
        };
        self.ranged
            .indexed_filter()
            .update_full_node(old, &filtered, acc)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::filter::NoCompleteChildSource;

    /// Serves children from a fixed complete node.
    struct FixedSource(Node);

    impl CompleteChildSource for FixedSource {
        fn child_after(&self, index: &Index, post: &NamedNode, reverse: bool) -> Option<NamedNode> {
            let mut sorted = self.0.sorted_children(index);
            if reverse {
                sorted.reverse();
            }
            let wanted = if reverse {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            sorted.into_iter().find(|c| index.compare(c, post) == wanted)
        }
    }

    fn letters() -> Node {
        Node::from_children([
            ("a", Node::from(1)),
            ("b", Node::from(2)),
            ("c", Node::from(3)),
            ("d", Node::from(4)),
        ])
    }

    fn first_two() -> LimitedFilter {
        let params = QueryParams::new().order_by(Index::Key).limit_to_first(2);
        LimitedFilter::new(&params, Limit::First(2))
    }

    fn sorted_kinds(acc: ChildChangeAccumulator) -> Vec<(String, ChangeKind)> {
        let mut out: Vec<_> = acc
            .into_changes()
            .into_iter()
            .map(|c| (c.key().map(ToString::to_string).unwrap_or_default(), c.kind()))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn full_node_keeps_window() {
        let f = first_two();
        let out = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        assert_eq!(
            out,
            Node::from_children([("a", Node::from(1)), ("b", Node::from(2))])
        );

        let params = QueryParams::new().order_by(Index::Key).limit_to_last(1);
        let last = LimitedFilter::new(&params, Limit::Last(1));
        let out = last.update_full_node(&Node::empty(), &letters(), None).unwrap();
        assert_eq!(out, Node::from_children([("d", Node::from(4))]));
    }

    #[test]
    fn entering_child_evicts_window_end() {
        let f = first_two();
        let snap = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        let mut acc = ChildChangeAccumulator::new();
        let out = f
            .update_child(&snap, &"0".into(), Node::from(0), &NoCompleteChildSource, Some(&mut acc))
            .unwrap();
        assert_eq!(
            out,
            Node::from_children([("0", Node::from(0)), ("a", Node::from(1))])
        );
        assert_eq!(
            sorted_kinds(acc),
            vec![
                ("0".to_string(), ChangeKind::ChildAdded),
                ("b".to_string(), ChangeKind::ChildRemoved),
            ]
        );
    }

    #[test]
    fn child_after_window_is_ignored() {
        let f = first_two();
        let snap = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        let out = f
            .update_child(&snap, &"z".into(), Node::from(9), &NoCompleteChildSource, None)
            .unwrap();
        assert!(out.ptr_eq(&snap));
    }

    #[test]
    fn leaving_child_pulls_next_candidate() {
        let f = first_two();
        let snap = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        let remaining = letters().update_immediate_child(&"a".into(), Node::empty());
        let mut acc = ChildChangeAccumulator::new();
        let out = f
            .update_child(
                &snap,
                &"a".into(),
                Node::empty(),
                &FixedSource(remaining),
                Some(&mut acc),
            )
            .unwrap();
        assert_eq!(
            out,
            Node::from_children([("b", Node::from(2)), ("c", Node::from(3))])
        );
        assert_eq!(
            sorted_kinds(acc),
            vec![
                ("a".to_string(), ChangeKind::ChildRemoved),
                ("c".to_string(), ChangeKind::ChildAdded),
            ]
        );
    }

    #[test]
    fn changed_child_inside_window_stays() {
        let params = QueryParams::new().order_by(Index::Value).limit_to_first(2);
        let f = LimitedFilter::new(&params, Limit::First(2));
        let snap = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        let mut acc = ChildChangeAccumulator::new();
        let out = f
            .update_child(
                &snap,
                &"b".into(),
                Node::from(0),
                &FixedSource(letters()),
                Some(&mut acc),
            )
            .unwrap();
        assert_eq!(out.immediate_child(&"b".into()), Node::from(0));
        assert_eq!(
            sorted_kinds(acc),
            vec![("b".to_string(), ChangeKind::ChildChanged)]
        );
    }

    #[test]
    fn changed_child_past_next_candidate_is_replaced() {
        let params = QueryParams::new().order_by(Index::Value).limit_to_first(2);
        let f = LimitedFilter::new(&params, Limit::First(2));
        let snap = f.update_full_node(&Node::empty(), &letters(), None).unwrap();
        let updated = letters().update_immediate_child(&"a".into(), Node::from(10));
        let mut acc = ChildChangeAccumulator::new();
        let out = f
            .update_child(
                &snap,
                &"a".into(),
                Node::from(10),
                &FixedSource(updated),
                Some(&mut acc),
            )
            .unwrap();
        assert_eq!(
            out,
            Node::from_children([("b", Node::from(2)), ("c", Node::from(3))])
        );
        assert_eq!(
            sorted_kinds(acc),
            vec![
                ("a".to_string(), ChangeKind::ChildRemoved),
                ("c".to_string(), ChangeKind::ChildAdded),
            ]
        );
    }
}
