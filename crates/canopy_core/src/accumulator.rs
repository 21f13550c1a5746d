//! Netting of per-child changes within one operation.

use crate::change::{Change, ChangeKind};
use crate::error::{CoreError, CoreResult};
use canopy_snap::ChildKey;
use std::collections::HashMap;

/// Collapses repeated touches of the same child into one net change.
///
/// A single operation may touch a child more than once, for example a
/// limited window evicting a child and then admitting it again. Only the net
/// effect reaches listeners.
#[derive(Debug, Default)]
pub struct ChildChangeAccumulator {
    changes: HashMap<ChildKey, Change>,
}

impl ChildChangeAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds `change` into the tracked change for its key.
    ///
    /// Fails for value changes, moves and `.priority` keys, and for
    /// sequences that cannot happen to a single child (adding a child twice,
    /// for instance).
    pub fn track_child_change(&mut self, change: Change) -> CoreResult<()> {
        let key = match &change {
            Change::Value { .. } => return Err(CoreError::untrackable("value change")),
            Change::ChildMoved { key, .. } => {
                return Err(CoreError::untrackable(format!("move of {key:?}")))
            }
            Change::ChildAdded { key, .. }
            | Change::ChildRemoved { key, .. }
            | Change::ChildChanged { key, .. } => key.clone(),
        };
        if key.is_priority() {
            return Err(CoreError::untrackable("priority change"));
        }

        let Some(tracked) = self.changes.remove(&key) else {
            self.changes.insert(key, change);
            return Ok(());
        };

        let merged = match (tracked, change) {
            (Change::ChildRemoved { old, .. }, Change::ChildAdded { node, .. }) => {
                Some(Change::ChildChanged {
                    key: key.clone(),
                    node,
                    old,
                })
            }
            (Change::ChildAdded { .. }, Change::ChildRemoved { .. }) => None,
            (Change::ChildChanged { old, .. }, Change::ChildRemoved { .. }) => {
                Some(Change::ChildRemoved {
                    key: key.clone(),
                    old,
                })
            }
            (Change::ChildAdded { .. }, Change::ChildChanged { node, .. }) => {
                Some(Change::ChildAdded {
                    key: key.clone(),
                    node,
                })
            }
            (Change::ChildChanged { old, .. }, Change::ChildChanged { node, .. }) => {
                Some(Change::ChildChanged {
                    key: key.clone(),
                    node,
                    old,
                })
            }
            (tracked, incoming) => {
                let err = invalid_transition(&key, tracked.kind(), incoming.kind());
                self.changes.insert(key, tracked);
                return Err(err);
            }
        };
        if let Some(merged) = merged {
            self.changes.insert(key, merged);
        }
        Ok(())
    }

    /// The net changes, in no particular order.
    pub fn changes(&self) -> Vec<Change> {
        self.changes.values().cloned().collect()
    }

    /// Consumes the accumulator, returning the net changes.
    pub fn into_changes(self) -> Vec<Change> {
        self.changes.into_values().collect()
    }

    /// Returns true when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn invalid_transition(key: &ChildKey, tracked: ChangeKind, incoming: ChangeKind) -> CoreError {
    CoreError::InvalidChangeTransition {
        key: key.to_string(),
        tracked,
        incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_snap::Node;
    use proptest::prelude::*;

    fn n(v: i32) -> Node {
        Node::from(v)
    }

    fn single(acc: &ChildChangeAccumulator) -> Change {
        let changes = acc.changes();
        assert_eq!(changes.len(), 1);
        changes.into_iter().next().unwrap()
    }

    #[test]
    fn removed_then_added_becomes_changed() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_removed("a", n(1))).unwrap();
        acc.track_child_change(Change::child_added("a", n(2))).unwrap();
        assert_eq!(single(&acc), Change::child_changed("a", n(2), n(1)));
    }

    #[test]
    fn added_then_removed_cancels() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added("a", n(1))).unwrap();
        acc.track_child_change(Change::child_removed("a", n(1))).unwrap();
        assert!(acc.is_empty());
    }

    #[test]
    fn changed_then_removed_keeps_original_old() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed("a", n(2), n(1))).unwrap();
        acc.track_child_change(Change::child_removed("a", n(2))).unwrap();
        assert_eq!(single(&acc), Change::child_removed("a", n(1)));
    }

    #[test]
    fn added_then_changed_stays_added() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added("a", n(1))).unwrap();
        acc.track_child_change(Change::child_changed("a", n(2), n(1))).unwrap();
        assert_eq!(single(&acc), Change::child_added("a", n(2)));
    }

    #[test]
    fn changed_twice_spans_both() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_changed("a", n(2), n(1))).unwrap();
        acc.track_child_change(Change::child_changed("a", n(3), n(2))).unwrap();
        assert_eq!(single(&acc), Change::child_changed("a", n(3), n(1)));
    }

    #[test]
    fn keys_are_independent() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added("a", n(1))).unwrap();
        acc.track_child_change(Change::child_removed("b", n(2))).unwrap();
        assert_eq!(acc.changes().len(), 2);
    }

    #[test]
    fn invalid_transitions_fail() {
        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_added("a", n(1))).unwrap();
        let err = acc.track_child_change(Change::child_added("a", n(2))).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidChangeTransition {
                key: "a".into(),
                tracked: ChangeKind::ChildAdded,
                incoming: ChangeKind::ChildAdded,
            }
        );
        assert_eq!(single(&acc), Change::child_added("a", n(1)));

        let mut acc = ChildChangeAccumulator::new();
        acc.track_child_change(Change::child_removed("a", n(1))).unwrap();
        assert!(acc.track_child_change(Change::child_changed("a", n(2), n(1))).is_err());
    }

    #[test]
    fn untrackable_changes_fail() {
        let mut acc = ChildChangeAccumulator::new();
        assert!(matches!(
            acc.track_child_change(Change::value(n(1))),
            Err(CoreError::UntrackableChange { .. })
        ));
        assert!(acc.track_child_change(Change::child_moved("a", n(1))).is_err());
        assert!(acc
            .track_child_change(Change::child_added(ChildKey::priority(), n(1)))
            .is_err());
        assert!(acc.is_empty());
    }

    /// Applies a random valid touch sequence to one child and checks the net
    /// change against the direct diff.
    fn net_matches_diff(start: Option<i32>, steps: &[Option<i32>]) -> Result<(), TestCaseError> {
        let mut acc = ChildChangeAccumulator::new();
        let mut current = start;
        for step in steps {
            let change = match (current, *step) {
                (None, Some(v)) => Change::child_added("k", n(v)),
                (Some(old), None) => Change::child_removed("k", n(old)),
                (Some(old), Some(v)) => Change::child_changed("k", n(v), n(old)),
                (None, None) => continue,
            };
            acc.track_child_change(change).unwrap();
            current = *step;
        }

        let expected = match (start, current) {
            (None, None) => None,
            (None, Some(v)) => Some(Change::child_added("k", n(v))),
            (Some(old), None) => Some(Change::child_removed("k", n(old))),
            (Some(old), Some(v)) => Some(Change::child_changed("k", n(v), n(old))),
        };
        let net = acc.changes().into_iter().next().filter(|c| match c {
            Change::ChildChanged { node, old, .. } => !node.same_as(old),
            _ => true,
        });
        let expected = expected.filter(|c| match c {
            Change::ChildChanged { node, old, .. } => !node.same_as(old),
            _ => true,
        });
        prop_assert_eq!(net, expected);
        Ok(())
    }

    proptest! {
        #[test]
        fn folding_equals_diff(
            start in proptest::option::of(0i32..4),
            steps in proptest::collection::vec(proptest::option::of(0i32..4), 0..8),
        ) {
            net_matches_diff(start, &steps)?;
        }
    }
}
