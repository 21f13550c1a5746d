//! Sibling ordering under a query index.

use crate::key::{name_compare, ChildKey};
use crate::node::Node;
use crate::path::Path;
use crate::value::Priority;
use std::cmp::Ordering;
use std::fmt;

/// A child paired with its key, the unit that indexes compare.
#[derive(Debug, Clone)]
pub struct NamedNode {
    /// Child key.
    pub name: ChildKey,
    /// Child snapshot.
    pub node: Node,
}

impl NamedNode {
    /// Creates a named node.
    pub fn new(name: impl Into<ChildKey>, node: Node) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

/// Compares two nodes by value: empty < false < true < numbers < strings <
/// internal nodes. Internal nodes are all equal to each other.
pub fn compare_values(a: &Node, b: &Node) -> Ordering {
    fn rank(n: &Node) -> u8 {
        if n.is_empty() {
            0
        } else if n.is_leaf() {
            1
        } else {
            2
        }
    }
    match (a.value(), b.value()) {
        (Some(x), Some(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// The ordering a query applies to the children of its location.
///
/// Every index breaks ties by key, so the order is total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Index {
    /// Order by priority (the default).
    #[default]
    Priority,
    /// Order by key.
    Key,
    /// Order by the child's own value.
    Value,
    /// Order by the value found at a path below each child.
    Child(Path),
}

impl Index {
    /// Compares two siblings.
    pub fn compare(&self, a: &NamedNode, b: &NamedNode) -> Ordering {
        let primary = match self {
            Index::Priority => Priority::compare(a.node.priority(), b.node.priority()),
            Index::Key => Ordering::Equal,
            Index::Value => compare_values(&a.node, &b.node),
            Index::Child(path) => compare_values(&a.node.child(path), &b.node.child(path)),
        };
        primary.then_with(|| name_compare(a.name.as_str(), b.name.as_str()))
    }

    /// Returns true if a child going from `old` to `new` may change position.
    pub fn indexed_value_changed(&self, old: &Node, new: &Node) -> bool {
        match self {
            Index::Priority => Priority::compare(old.priority(), new.priority()).is_ne(),
            Index::Key => false,
            Index::Value => compare_values(old, new).is_ne(),
            Index::Child(path) => compare_values(&old.child(path), &new.child(path)).is_ne(),
        }
    }

    /// Builds the sibling used as a range bound for `value` and `name`.
    ///
    /// For the key index the bound value itself names the position when it
    /// is a string.
    pub fn bound(&self, value: &Node, name: ChildKey) -> NamedNode {
        match self {
            Index::Priority => {
                let priority = value.value().and_then(|v| Priority::from_scalar(v).ok());
                NamedNode::new(name, Node::leaf(true).with_priority(priority))
            }
            Index::Key => {
                let key = value
                    .value()
                    .and_then(|v| v.as_text())
                    .map_or(name, ChildKey::from);
                NamedNode::new(key, Node::empty())
            }
            Index::Value => NamedNode::new(name, value.clone()),
            Index::Child(path) => NamedNode::new(name, Node::empty().update_child(path, value.clone())),
        }
    }

    /// Stable textual identifier used in query identifiers.
    pub fn identifier(&self) -> String {
        match self {
            Index::Priority => ".priority".to_string(),
            Index::Key => ".key".to_string(),
            Index::Value => ".value".to_string(),
            Index::Child(path) => path.to_string(),
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}
