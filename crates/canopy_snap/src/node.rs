//! The immutable snapshot tree.

use crate::index::{Index, NamedNode};
use crate::key::ChildKey;
use crate::path::Path;
use crate::value::{Priority, Scalar};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// An immutable snapshot of tree-shaped data.
///
/// A node is either a leaf holding a [`Scalar`] or an internal node mapping
/// child keys to nodes; either may carry a [`Priority`]. Nodes are shared
/// through `Arc`, so cloning is cheap and every update returns a new node
/// that reuses all untouched subtrees. An existing node never changes.
///
/// `PartialEq` compares data only. Use [`Node::same_as`] when priorities
/// must match too.
#[derive(Clone)]
pub struct Node(Arc<NodeKind>);

#[derive(Debug)]
enum NodeKind {
    Leaf {
        value: Scalar,
        priority: Option<Priority>,
    },
    Children {
        children: BTreeMap<ChildKey, Node>,
        priority: Option<Priority>,
    },
}

static EMPTY_NODE: LazyLock<Node> = LazyLock::new(|| {
    Node(Arc::new(NodeKind::Children {
        children: BTreeMap::new(),
        priority: None,
    }))
});

impl Node {
    /// The canonical "no data" node.
    pub fn empty() -> Self {
        EMPTY_NODE.clone()
    }

    /// Creates a leaf without a priority.
    pub fn leaf(value: impl Into<Scalar>) -> Self {
        Node(Arc::new(NodeKind::Leaf {
            value: value.into(),
            priority: None,
        }))
    }

    /// Creates an internal node from `(key, child)` pairs.
    ///
    /// Empty children are dropped; with no children left the result is the
    /// empty node.
    pub fn from_children<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<ChildKey>,
    {
        let children: BTreeMap<ChildKey, Node> = children
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .filter(|(k, v)| !v.is_empty() && !k.is_priority())
            .collect();
        Self::with_children(children, None)
    }

    fn with_children(children: BTreeMap<ChildKey, Node>, priority: Option<Priority>) -> Self {
        if children.is_empty() {
            return Self::empty();
        }
        Node(Arc::new(NodeKind::Children { children, priority }))
    }

    /// Returns true for the empty node.
    pub fn is_empty(&self) -> bool {
        matches!(&*self.0, NodeKind::Children { children, .. } if children.is_empty())
    }

    /// Returns true for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(&*self.0, NodeKind::Leaf { .. })
    }

    /// The leaf value, if this is a leaf.
    pub fn value(&self) -> Option<&Scalar> {
        match &*self.0 {
            NodeKind::Leaf { value, .. } => Some(value),
            NodeKind::Children { .. } => None,
        }
    }

    /// The node's priority.
    pub fn priority(&self) -> Option<&Priority> {
        match &*self.0 {
            NodeKind::Leaf { priority, .. } | NodeKind::Children { priority, .. } => {
                priority.as_ref()
            }
        }
    }

    /// The priority as a leaf node (empty when there is none).
    pub fn priority_node(&self) -> Node {
        self.priority()
            .map_or_else(Node::empty, |p| Node::leaf(p.to_scalar()))
    }

    /// Returns a copy with the priority replaced.
    ///
    /// The empty node cannot carry a priority and is returned unchanged.
    #[must_use]
    pub fn with_priority(&self, priority: Option<Priority>) -> Self {
        if Priority::compare(self.priority(), priority.as_ref()).is_eq() {
            return self.clone();
        }
        match &*self.0 {
            NodeKind::Leaf { value, .. } => Node(Arc::new(NodeKind::Leaf {
                value: value.clone(),
                priority,
            })),
            NodeKind::Children { children, .. } => {
                if children.is_empty() {
                    return self.clone();
                }
                Node(Arc::new(NodeKind::Children {
                    children: children.clone(),
                    priority,
                }))
            }
        }
    }

    /// Returns true if this node has a non-empty child at `key`.
    pub fn has_child(&self, key: &ChildKey) -> bool {
        if key.is_priority() {
            return self.priority().is_some();
        }
        match &*self.0 {
            NodeKind::Children { children, .. } => children.contains_key(key),
            NodeKind::Leaf { .. } => false,
        }
    }

    /// The direct child at `key`, or the empty node.
    ///
    /// `.priority` yields the priority as a leaf.
    pub fn immediate_child(&self, key: &ChildKey) -> Node {
        if key.is_priority() {
            return self.priority_node();
        }
        match &*self.0 {
            NodeKind::Children { children, .. } => {
                children.get(key).cloned().unwrap_or_else(Node::empty)
            }
            NodeKind::Leaf { .. } => Node::empty(),
        }
    }

    /// The descendant at `path`, or the empty node. Never fails.
    pub fn child(&self, path: &Path) -> Node {
        let mut current = self.clone();
        for key in path.iter() {
            current = current.immediate_child(key);
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Returns a node with the direct child at `key` replaced.
    ///
    /// An empty `child` removes the key. Writing `.priority` sets the
    /// priority (values that are not valid priorities clear it). Writing a
    /// child into a leaf turns it into an internal node that keeps the
    /// leaf's priority.
    #[must_use]
    pub fn update_immediate_child(&self, key: &ChildKey, child: Node) -> Self {
        if key.is_priority() {
            let priority = child.value().and_then(|v| Priority::from_scalar(v).ok());
            return self.with_priority(priority);
        }
        match &*self.0 {
            NodeKind::Leaf { priority, .. } => {
                if child.is_empty() {
                    return self.clone();
                }
                let mut children = BTreeMap::new();
                children.insert(key.clone(), child);
                Self::with_children(children, priority.clone())
            }
            NodeKind::Children { children, priority } => {
                match children.get(key) {
                    Some(existing) if existing.same_as(&child) => return self.clone(),
                    None if child.is_empty() => return self.clone(),
                    _ => {}
                }
                let mut children = children.clone();
                if child.is_empty() {
                    children.remove(key);
                } else {
                    children.insert(key.clone(), child);
                }
                Self::with_children(children, priority.clone())
            }
        }
    }

    /// Returns a node with the descendant at `path` replaced.
    ///
    /// Writing the root replaces the whole node.
    #[must_use]
    pub fn update_child(&self, path: &Path, node: Node) -> Self {
        let segments: Vec<&ChildKey> = path.iter().collect();
        self.update_at(&segments, node)
    }

    fn update_at(&self, segments: &[&ChildKey], node: Node) -> Self {
        match segments.split_first() {
            None => node,
            Some((front, rest)) => {
                if front.is_priority() {
                    return self.update_immediate_child(front, node);
                }
                let child = self.immediate_child(front).update_at(rest, node);
                self.update_immediate_child(front, child)
            }
        }
    }

    /// Number of direct children.
    pub fn num_children(&self) -> usize {
        match &*self.0 {
            NodeKind::Children { children, .. } => children.len(),
            NodeKind::Leaf { .. } => 0,
        }
    }

    /// Direct children in key order.
    pub fn children(&self) -> impl Iterator<Item = (&ChildKey, &Node)> + '_ {
        let map = match &*self.0 {
            NodeKind::Children { children, .. } => Some(children),
            NodeKind::Leaf { .. } => None,
        };
        map.into_iter().flat_map(|m| m.iter())
    }

    /// Direct children sorted under `index`.
    pub fn sorted_children(&self, index: &Index) -> Vec<NamedNode> {
        let mut named: Vec<NamedNode> = self
            .children()
            .map(|(k, v)| NamedNode::new(k.clone(), v.clone()))
            .collect();
        if !matches!(index, Index::Key) {
            named.sort_by(|a, b| index.compare(a, b));
        }
        named
    }

    /// The key that sorts directly before `key` under `index`.
    pub fn predecessor(&self, key: &ChildKey, index: &Index) -> Option<ChildKey> {
        let sorted = self.sorted_children(index);
        let pos = sorted.iter().position(|n| &n.name == key)?;
        pos.checked_sub(1).map(|p| sorted[p].name.clone())
    }

    /// Returns true if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Compares data and priorities at every level.
    pub fn same_as(&self, other: &Node) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if Priority::compare(self.priority(), other.priority()).is_ne() {
            return false;
        }
        match (&*self.0, &*other.0) {
            (NodeKind::Leaf { value: a, .. }, NodeKind::Leaf { value: b, .. }) => a == b,
            (NodeKind::Children { children: a, .. }, NodeKind::Children { children: b, .. }) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same_as(vb))
            }
            _ => false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (NodeKind::Leaf { value: a, .. }, NodeKind::Leaf { value: b, .. }) => a == b,
            (NodeKind::Children { children: a, .. }, NodeKind::Children { children: b, .. }) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Default for Node {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.to_json(true))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json(false))
    }
}

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Node::leaf(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::leaf(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::leaf(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::leaf(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::leaf(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::leaf(value)
    }
}
