//! Turns view changes into ordered listener events.

use crate::change::{Change, ChangeKind, Event};
use crate::types::ListenerId;
use canopy_snap::{Index, NamedNode, Node, Path};
use std::collections::BTreeSet;

/// A listener attached to a view and the event kinds it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    id: ListenerId,
    kinds: BTreeSet<ChangeKind>,
}

impl Registration {
    /// A listener for the given kinds.
    pub fn new(id: ListenerId, kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        Self {
            id,
            kinds: kinds.into_iter().collect(),
        }
    }

    /// A value listener.
    pub fn value(id: ListenerId) -> Self {
        Self::new(id, [ChangeKind::Value])
    }

    /// A listener for the four child kinds.
    pub fn children(id: ListenerId) -> Self {
        Self::new(
            id,
            ChangeKind::ALL
                .into_iter()
                .filter(|k| *k != ChangeKind::Value),
        )
    }

    /// A listener for every kind.
    pub fn all(id: ListenerId) -> Self {
        Self::new(id, ChangeKind::ALL)
    }

    /// The listener id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Kinds this listener receives.
    pub fn kinds(&self) -> &BTreeSet<ChangeKind> {
        &self.kinds
    }

    /// Returns true if this listener receives `kind`.
    pub fn responds_to(&self, kind: ChangeKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Orders changes and fans them out to registrations.
#[derive(Debug, Clone)]
pub struct EventGenerator {
    path: Path,
    index: Index,
}

impl EventGenerator {
    /// Creates a generator for a view at `path` ordered by `index`.
    pub fn new(path: Path, index: Index) -> Self {
        Self { path, index }
    }

    /// Builds events for `changes` against the new event snapshot.
    ///
    /// Kinds are delivered removed, added, moved, changed, then value;
    /// within a kind children follow the query index. Each change yields
    /// one event per registration that wants its kind, in registration
    /// order.
    pub fn generate_events(
        &self,
        changes: Vec<Change>,
        event_snap: &Node,
        registrations: &[Registration],
    ) -> Vec<Event> {
        let mut moves = Vec::new();
        let mut kept = Vec::with_capacity(changes.len());
        for change in changes {
            if let Change::ChildChanged { key, node, old } = &change {
                if node.same_as(old) {
                    continue;
                }
                if self.index.indexed_value_changed(old, node) {
                    moves.push(Change::child_moved(key.clone(), node.clone()));
                }
            }
            kept.push(change);
        }
        kept.extend(moves);

        let mut events = Vec::new();
        for kind in ChangeKind::ALL {
            let mut of_kind: Vec<&Change> = kept.iter().filter(|c| c.kind() == kind).collect();
            of_kind.sort_by(|a, b| self.compare_changes(a, b));
            for change in of_kind {
                self.fan_out(change, event_snap, registrations, &mut events);
            }
        }
        events
    }

    fn compare_changes(&self, a: &Change, b: &Change) -> std::cmp::Ordering {
        match (a.key(), b.key()) {
            (Some(ka), Some(kb)) => self.index.compare(
                &NamedNode::new(ka.clone(), a.node().clone()),
                &NamedNode::new(kb.clone(), b.node().clone()),
            ),
            _ => std::cmp::Ordering::Equal,
        }
    }

    fn fan_out(
        &self,
        change: &Change,
        event_snap: &Node,
        registrations: &[Registration],
        out: &mut Vec<Event>,
    ) {
        let kind = change.kind();
        let prev_key = match (kind, change.key()) {
            (ChangeKind::ChildAdded | ChangeKind::ChildChanged | ChangeKind::ChildMoved, Some(key)) => {
                event_snap.predecessor(key, &self.index)
            }
            _ => None,
        };
        for registration in registrations.iter().filter(|r| r.responds_to(kind)) {
            out.push(Event {
                kind,
                listener: registration.id(),
                path: self.path.clone(),
                key: change.key().cloned(),
                node: change.node().clone(),
                prev_key: prev_key.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_snap::ChildKey;

    fn generator(index: Index) -> EventGenerator {
        EventGenerator::new(Path::parse("items").unwrap(), index)
    }

    fn summary(events: &[Event]) -> Vec<(ChangeKind, Option<String>, Option<String>)> {
        events
            .iter()
            .map(|e| {
                (
                    e.kind,
                    e.key.as_ref().map(ToString::to_string),
                    e.prev_key.as_ref().map(ChildKey::to_string),
                )
            })
            .collect()
    }

    #[test]
    fn kinds_are_delivered_in_order() {
        let snap = Node::from_children([("a", Node::from(1)), ("c", Node::from(3))]);
        let changes = vec![
            Change::value(snap.clone()),
            Change::child_changed("a", Node::from(1), Node::from(0)),
            Change::child_added("c", Node::from(3)),
            Change::child_removed("b", Node::from(2)),
        ];
        let events = generator(Index::Key).generate_events(
            changes,
            &snap,
            &[Registration::all(ListenerId::new(1))],
        );
        assert_eq!(
            summary(&events),
            vec![
                (ChangeKind::ChildRemoved, Some("b".into()), None),
                (ChangeKind::ChildAdded, Some("c".into()), Some("a".into())),
                (ChangeKind::ChildChanged, Some("a".into()), None),
                (ChangeKind::Value, None, None),
            ]
        );
    }

    #[test]
    fn children_of_one_kind_follow_the_index() {
        let snap = Node::from_children([
            ("x", Node::from(3)),
            ("y", Node::from(1)),
            ("z", Node::from(2)),
        ]);
        let changes = vec![
            Change::child_added("x", Node::from(3)),
            Change::child_added("y", Node::from(1)),
            Change::child_added("z", Node::from(2)),
        ];
        let events = generator(Index::Value).generate_events(
            changes,
            &snap,
            &[Registration::children(ListenerId::new(1))],
        );
        assert_eq!(
            summary(&events),
            vec![
                (ChangeKind::ChildAdded, Some("y".into()), None),
                (ChangeKind::ChildAdded, Some("z".into()), Some("y".into())),
                (ChangeKind::ChildAdded, Some("x".into()), Some("z".into())),
            ]
        );
    }

    #[test]
    fn index_change_adds_move() {
        let snap = Node::from_children([("a", Node::from(5)), ("b", Node::from(2))]);
        let changes = vec![Change::child_changed("a", Node::from(5), Node::from(1))];
        let events = generator(Index::Value).generate_events(
            changes,
            &snap,
            &[Registration::children(ListenerId::new(1))],
        );
        assert_eq!(
            summary(&events),
            vec![
                (ChangeKind::ChildMoved, Some("a".into()), Some("b".into())),
                (ChangeKind::ChildChanged, Some("a".into()), Some("b".into())),
            ]
        );

        let by_key = generator(Index::Key).generate_events(
            vec![Change::child_changed("a", Node::from(5), Node::from(1))],
            &snap,
            &[Registration::children(ListenerId::new(1))],
        );
        assert_eq!(by_key.len(), 1);
    }

    #[test]
    fn unchanged_children_are_dropped() {
        let snap = Node::from_children([("a", Node::from(1))]);
        let events = generator(Index::Priority).generate_events(
            vec![Change::child_changed("a", Node::from(1), Node::from(1))],
            &snap,
            &[Registration::all(ListenerId::new(1))],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn fan_out_respects_kinds_and_order() {
        let snap = Node::from_children([("a", Node::from(1))]);
        let registrations = [
            Registration::value(ListenerId::new(1)),
            Registration::children(ListenerId::new(2)),
            Registration::all(ListenerId::new(3)),
        ];
        let events = generator(Index::Priority).generate_events(
            vec![
                Change::child_added("a", Node::from(1)),
                Change::value(snap.clone()),
            ],
            &snap,
            &registrations,
        );
        let order: Vec<(ChangeKind, u64)> =
            events.iter().map(|e| (e.kind, e.listener.as_u64())).collect();
        assert_eq!(
            order,
            vec![
                (ChangeKind::ChildAdded, 2),
                (ChangeKind::ChildAdded, 3),
                (ChangeKind::Value, 1),
                (ChangeKind::Value, 3),
            ]
        );
        assert!(events.iter().all(|e| e.path.to_string() == "/items"));
    }
}
