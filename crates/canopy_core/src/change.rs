//! Diff units and delivered events.

use crate::types::ListenerId;
use canopy_snap::{ChildKey, Node, Path};
use std::fmt;

/// Kind of a change or event.
///
/// The declaration order is the delivery order within one operation, with
/// `Value` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// A child left the view.
    ChildRemoved,
    /// A child entered the view.
    ChildAdded,
    /// A child changed position under the query index.
    ChildMoved,
    /// A child's data changed.
    ChildChanged,
    /// The whole value at the location.
    Value,
}

impl ChangeKind {
    /// All kinds in delivery order.
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::ChildRemoved,
        ChangeKind::ChildAdded,
        ChangeKind::ChildMoved,
        ChangeKind::ChildChanged,
        ChangeKind::Value,
    ];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeKind::ChildRemoved => "child_removed",
            ChangeKind::ChildAdded => "child_added",
            ChangeKind::ChildMoved => "child_moved",
            ChangeKind::ChildChanged => "child_changed",
            ChangeKind::Value => "value",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of difference between two snapshots of a view.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The complete value at the view location.
    Value {
        /// New snapshot.
        node: Node,
    },
    /// A child was added.
    ChildAdded {
        /// Child key.
        key: ChildKey,
        /// New child.
        node: Node,
    },
    /// A child was removed.
    ChildRemoved {
        /// Child key.
        key: ChildKey,
        /// Child before removal.
        old: Node,
    },
    /// A child's data changed.
    ChildChanged {
        /// Child key.
        key: ChildKey,
        /// New child.
        node: Node,
        /// Child before the change.
        old: Node,
    },
    /// A child moved under the query index.
    ChildMoved {
        /// Child key.
        key: ChildKey,
        /// Current child.
        node: Node,
    },
}

impl Change {
    /// Creates a value change.
    pub fn value(node: Node) -> Self {
        Change::Value { node }
    }

    /// Creates a child added change.
    pub fn child_added(key: impl Into<ChildKey>, node: Node) -> Self {
        Change::ChildAdded {
            key: key.into(),
            node,
        }
    }

    /// Creates a child removed change.
    pub fn child_removed(key: impl Into<ChildKey>, old: Node) -> Self {
        Change::ChildRemoved {
            key: key.into(),
            old,
        }
    }

    /// Creates a child changed change.
    pub fn child_changed(key: impl Into<ChildKey>, node: Node, old: Node) -> Self {
        Change::ChildChanged {
            key: key.into(),
            node,
            old,
        }
    }

    /// Creates a child moved change.
    pub fn child_moved(key: impl Into<ChildKey>, node: Node) -> Self {
        Change::ChildMoved {
            key: key.into(),
            node,
        }
    }

    /// The kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Value { .. } => ChangeKind::Value,
            Change::ChildAdded { .. } => ChangeKind::ChildAdded,
            Change::ChildRemoved { .. } => ChangeKind::ChildRemoved,
            Change::ChildChanged { .. } => ChangeKind::ChildChanged,
            Change::ChildMoved { .. } => ChangeKind::ChildMoved,
        }
    }

    /// The child key, for child changes.
    pub fn key(&self) -> Option<&ChildKey> {
        match self {
            Change::Value { .. } => None,
            Change::ChildAdded { key, .. }
            | Change::ChildRemoved { key, .. }
            | Change::ChildChanged { key, .. }
            | Change::ChildMoved { key, .. } => Some(key),
        }
    }

    /// The snapshot an event for this change carries.
    ///
    /// For removals this is the removed child.
    pub fn node(&self) -> &Node {
        match self {
            Change::Value { node }
            | Change::ChildAdded { node, .. }
            | Change::ChildChanged { node, .. }
            | Change::ChildMoved { node, .. } => node,
            Change::ChildRemoved { old, .. } => old,
        }
    }

    /// The previous child, for removals and changes.
    pub fn old(&self) -> Option<&Node> {
        match self {
            Change::ChildRemoved { old, .. } | Change::ChildChanged { old, .. } => Some(old),
            _ => None,
        }
    }
}

/// A notification delivered to one listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event kind.
    pub kind: ChangeKind,
    /// Receiving listener.
    pub listener: ListenerId,
    /// Location of the listener's query.
    pub path: Path,
    /// Child key, for child events.
    pub key: Option<ChildKey>,
    /// Snapshot of the value or child.
    pub node: Node,
    /// Key of the preceding sibling under the query index.
    pub prev_key: Option<ChildKey>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.listener, self.kind, self.path)?;
        if let Some(key) = &self.key {
            write!(f, " key={key}")?;
        }
        write!(f, " {}", self.node)?;
        if let Some(prev) = &self.prev_key {
            write!(f, " prev={prev}")?;
        }
        Ok(())
    }
}
