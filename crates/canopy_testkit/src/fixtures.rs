//! Test fixtures and engine helpers.
//!
//! Provides event capture, JSON shorthands and seeded sync trees for
//! common scenarios.

use canopy_core::{ChangeKind, Event, ListenerId};
use canopy_snap::{ChildKey, Node, Path};
use parking_lot::Mutex;
use std::sync::Arc;

/// Captures events delivered to a callback.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends every event it receives to this log.
    pub fn callback(&self) -> Arc<dyn Fn(&Event) + Send + Sync> {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &Event| events.lock().push(event.clone()))
    }

    /// Records one event.
    pub fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Records events returned by an engine call.
    pub fn extend(&self, events: impl IntoIterator<Item = Event>) {
        self.events.lock().extend(events);
    }

    /// All events so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of captured events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forgets every captured event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Returns the captured events and empties the log.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// The kinds of the captured events, in order.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Events delivered to `listener`.
    pub fn for_listener(&self, listener: ListenerId) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.listener == listener)
            .cloned()
            .collect()
    }

    /// One `kind key` entry per event, with `value` events shown as `value`
    /// alone. Handy for order assertions.
    pub fn summary(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| match &e.key {
                Some(key) => format!("{} {}", e.kind, key),
                None => e.kind.to_string(),
            })
            .collect()
    }
}

/// Builds a node from JSON.
///
/// # Panics
///
/// Panics if the JSON does not describe a valid node.
pub fn json_node(value: serde_json::Value) -> Node {
    Node::from_json(&value).expect("Invalid node JSON")
}

/// Parses a path.
///
/// # Panics
///
/// Panics if the text is not a valid path.
pub fn path(text: &str) -> Path {
    Path::parse(text).expect("Invalid path")
}

/// Parses a child key.
///
/// # Panics
///
/// Panics if the text is not a valid key.
pub fn key(text: &str) -> ChildKey {
    ChildKey::parse(text).expect("Invalid key")
}

/// Ready-made engine setups.
pub mod scenarios {
    use super::{json_node, path};
    use canopy_core::{
        Config, ListenerId, NullListenProvider, QuerySpec, Registration, SyncTree,
    };
    use canopy_snap::Node;

    /// The tree `{a: 1, b: 2}`.
    pub fn small_tree() -> Node {
        json_node(serde_json::json!({"a": 1, "b": 2}))
    }

    /// Five letters keyed `a` to `e`, valued so that value order reverses key
    /// order.
    pub fn letters() -> Node {
        json_node(serde_json::json!({"a": 5, "b": 4, "c": 3, "d": 2, "e": 1}))
    }

    /// A sync tree with one listener on the default query at `at`, already
    /// seeded with `data` from the server.
    ///
    /// Returns the tree and the listener id. Seeding events are discarded.
    ///
    /// # Panics
    ///
    /// Panics if the registration or the seed write fails.
    pub fn seeded_tree(at: &str, data: Node) -> (SyncTree<NullListenProvider>, ListenerId) {
        let mut tree = SyncTree::without_provider(Config::new().session("fixture"));
        let listener = ListenerId::new(1);
        tree.add_event_registration(
            QuerySpec::default_at(path(at)),
            Registration::all(listener),
        )
        .expect("Failed to register fixture listener");
        tree.apply_server_overwrite(path(at), data)
            .expect("Failed to seed fixture tree");
        (tree, listener)
    }
}
