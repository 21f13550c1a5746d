//! Cached snapshots with completeness flags.

use canopy_snap::{ChildKey, Node, Path};

/// A snapshot plus what the cache knows about its completeness.
///
/// `fully_initialized` means the node reflects everything at its location
/// (for the query). `filtered` means children may have been left out by a
/// query filter, so a missing child does not prove absence.
#[derive(Debug, Clone, Default)]
pub struct CacheNode {
    node: Node,
    fully_initialized: bool,
    filtered: bool,
}

impl CacheNode {
    /// Creates a cache node.
    pub fn new(node: Node, fully_initialized: bool, filtered: bool) -> Self {
        Self {
            node,
            fully_initialized,
            filtered,
        }
    }

    /// The cached snapshot.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Whether the snapshot is complete for its location.
    pub fn is_fully_initialized(&self) -> bool {
        self.fully_initialized
    }

    /// Whether a filter may have dropped children.
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Returns true if the cache can answer for the data at `path`.
    pub fn is_complete_for_path(&self, path: &Path) -> bool {
        match path.front() {
            None => self.fully_initialized && !self.filtered,
            Some(key) => self.is_complete_for_child(key),
        }
    }

    /// Returns true if the cache can answer for the child at `key`.
    pub fn is_complete_for_child(&self, key: &ChildKey) -> bool {
        (self.fully_initialized && !self.filtered) || self.node.has_child(key)
    }
}
