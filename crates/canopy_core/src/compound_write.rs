//! Non-overlapping sets of writes keyed by path.

use canopy_snap::{ChildKey, NamedNode, Node, Path};
use std::collections::BTreeMap;

/// A set of node writes at distinct, non-nested paths.
///
/// No entry is an ancestor of another: a write below an existing entry is
/// folded into that entry, and a write above existing entries replaces them.
/// An empty node entry means "this location is deleted".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundWrite {
    writes: BTreeMap<Path, Node>,
}

impl CompoundWrite {
    /// A compound write with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A compound write that replaces the whole location with `node`.
    pub fn from_node(node: Node) -> Self {
        Self::empty().add_write(&Path::root(), node)
    }

    /// Builds a compound write from relative `(path, node)` pairs, applied in
    /// iteration order.
    pub fn from_writes<I>(writes: I) -> Self
    where
        I: IntoIterator<Item = (Path, Node)>,
    {
        writes
            .into_iter()
            .fold(Self::empty(), |acc, (path, node)| acc.add_write(&path, node))
    }

    /// Returns true when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Node)> {
        self.writes.iter()
    }

    /// Finds the entry at `path` or at one of its ancestors.
    fn covering(&self, path: &Path) -> Option<(&Path, &Node)> {
        let keys: Vec<&ChildKey> = path.iter().collect();
        (0..=keys.len()).find_map(|len| {
            let prefix = Path::from_keys(keys[..len].iter().map(|k| (*k).clone()));
            self.writes.get_key_value(&prefix)
        })
    }

    /// Returns a copy with `node` written at `path`.
    #[must_use]
    pub fn add_write(&self, path: &Path, node: Node) -> Self {
        let mut writes = self.writes.clone();
        if let Some((root, existing)) = self.covering(path) {
            let relative = path.relative_to(root).unwrap_or_default();
            let updated = existing.update_child(&relative, node);
            writes.insert(root.clone(), updated);
        } else {
            writes.retain(|p, _| !path.contains(p));
            writes.insert(path.clone(), node);
        }
        Self { writes }
    }

    /// Returns a copy with every entry of `other` written below `path`.
    #[must_use]
    pub fn add_writes(&self, path: &Path, other: &CompoundWrite) -> Self {
        other
            .iter()
            .fold(self.clone(), |acc, (p, node)| acc.add_write(&path.join(p), node.clone()))
    }

    /// Returns true if `path` is entirely determined by this write.
    pub fn has_complete_write(&self, path: &Path) -> bool {
        self.covering(path).is_some()
    }

    /// The node at `path` if it is entirely determined by this write.
    pub fn complete_node(&self, path: &Path) -> Option<Node> {
        self.covering(path).map(|(root, node)| {
            let relative = path.relative_to(root).unwrap_or_default();
            node.child(&relative)
        })
    }

    /// The write at the root of this compound write, if any.
    pub fn root_write(&self) -> Option<&Node> {
        self.writes.get(&Path::root())
    }

    /// The part of this write below `path`, relative to `path`.
    pub fn child_compound_write(&self, path: &Path) -> Self {
        if path.is_empty() {
            return self.clone();
        }
        if let Some(node) = self.complete_node(path) {
            return Self::from_node(node);
        }
        let writes = self
            .writes
            .iter()
            .filter_map(|(p, n)| p.relative_to(path).map(|rel| (rel, n.clone())))
            .collect();
        Self { writes }
    }

    /// Direct children fully determined by this write.
    ///
    /// Deleted children appear with an empty node.
    pub fn complete_children(&self) -> Vec<NamedNode> {
        if let Some(root) = self.root_write() {
            return root
                .children()
                .map(|(k, v)| NamedNode::new(k.clone(), v.clone()))
                .collect();
        }
        self.writes
            .iter()
            .filter(|(p, _)| p.len() == 1 && p.front().is_some_and(|k| !k.is_priority()))
            .filter_map(|(p, n)| p.front().map(|k| NamedNode::new(k.clone(), n.clone())))
            .collect()
    }

    /// Applies every entry to `node`.
    ///
    /// Priority entries go last so they land on the data written by the
    /// others.
    pub fn apply(&self, node: &Node) -> Node {
        let data = self.writes.iter().filter(|(p, _)| !is_priority_write(p));
        let priorities = self.writes.iter().filter(|(p, _)| is_priority_write(p));
        data.chain(priorities)
            .fold(node.clone(), |acc, (p, n)| acc.update_child(p, n.clone()))
    }
}

fn is_priority_write(path: &Path) -> bool {
    path.back().is_some_and(ChildKey::is_priority)
}
