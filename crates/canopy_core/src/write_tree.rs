//! Ordered overlay of pending local writes.

use crate::cache::CacheNode;
use crate::compound_write::CompoundWrite;
use crate::error::{CoreError, CoreResult};
use crate::types::WriteId;
use canopy_snap::{ChildKey, Index, NamedNode, Node, Path};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Payload of a pending write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteKind {
    /// Replaces the node at the write path.
    Overwrite(Node),
    /// Replaces several locations below the write path.
    Merge(CompoundWrite),
}

/// A local write that the server has not acknowledged yet.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Write id, unique and increasing.
    pub write_id: WriteId,
    /// Location of the write.
    pub path: Path,
    /// The written data.
    pub kind: WriteKind,
    /// Whether listeners see the write before it is acknowledged.
    pub visible: bool,
}

impl WriteRecord {
    /// The write as a compound write relative to its path.
    pub fn to_compound_write(&self) -> CompoundWrite {
        match &self.kind {
            WriteKind::Overwrite(node) => CompoundWrite::from_node(node.clone()),
            WriteKind::Merge(children) => children.clone(),
        }
    }
}

/// All pending writes, in id order, plus the overlay of the visible ones.
///
/// The overlay always equals replaying the visible writes in id order.
#[derive(Debug, Clone)]
pub struct WriteTree {
    visible: CompoundWrite,
    writes: Vec<WriteRecord>,
    last_write_id: Option<WriteId>,
    max_pending: usize,
}

impl Default for WriteTree {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl WriteTree {
    /// Creates an empty write tree accepting at most `max_pending` writes.
    pub fn new(max_pending: usize) -> Self {
        Self {
            visible: CompoundWrite::empty(),
            writes: Vec::new(),
            last_write_id: None,
            max_pending,
        }
    }

    fn check_new_write(&self, write_id: WriteId) -> CoreResult<()> {
        if let Some(last) = self.last_write_id {
            if write_id <= last {
                return Err(CoreError::WriteIdNotMonotonic {
                    last,
                    attempted: write_id,
                });
            }
        }
        if self.writes.len() >= self.max_pending {
            return Err(CoreError::TooManyPendingWrites {
                limit: self.max_pending,
            });
        }
        Ok(())
    }

    /// Records an overwrite after all existing writes.
    pub fn add_overwrite(
        &mut self,
        path: Path,
        node: Node,
        write_id: WriteId,
        visible: bool,
    ) -> CoreResult<()> {
        self.check_new_write(write_id)?;
        if visible {
            self.visible = self.visible.add_write(&path, node.clone());
        }
        self.writes.push(WriteRecord {
            write_id,
            path,
            kind: WriteKind::Overwrite(node),
            visible,
        });
        self.last_write_id = Some(write_id);
        Ok(())
    }

    /// Records a merge after all existing writes. Merges are always visible.
    pub fn add_merge(
        &mut self,
        path: Path,
        children: CompoundWrite,
        write_id: WriteId,
    ) -> CoreResult<()> {
        self.check_new_write(write_id)?;
        self.visible = self.visible.add_writes(&path, &children);
        self.writes.push(WriteRecord {
            write_id,
            path,
            kind: WriteKind::Merge(children),
            visible: true,
        });
        self.last_write_id = Some(write_id);
        Ok(())
    }

    /// Removes a pending write and rebuilds the visible overlay from the
    /// remaining writes.
    pub fn remove_write(&mut self, write_id: WriteId) -> CoreResult<WriteRecord> {
        let pos = self
            .writes
            .iter()
            .position(|w| w.write_id == write_id)
            .ok_or(CoreError::UnknownWrite { write_id })?;
        let removed = self.writes.remove(pos);
        if removed.visible {
            self.visible = Self::layer(&self.writes, false);
        }
        Ok(removed)
    }

    /// Pending writes in id order.
    pub fn pending_writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true when no write is pending.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Id of the most recent write ever added.
    pub fn last_write_id(&self) -> Option<WriteId> {
        self.last_write_id
    }

    /// The overlay of visible writes.
    pub fn visible_writes(&self) -> &CompoundWrite {
        &self.visible
    }

    fn layer(writes: &[WriteRecord], include_hidden: bool) -> CompoundWrite {
        writes
            .iter()
            .filter(|w| include_hidden || w.visible)
            .fold(CompoundWrite::empty(), |acc, w| match &w.kind {
                WriteKind::Overwrite(node) => acc.add_write(&w.path, node.clone()),
                WriteKind::Merge(children) => acc.add_writes(&w.path, children),
            })
    }

    fn overlay(&self, include_hidden: bool) -> Cow<'_, CompoundWrite> {
        if include_hidden && self.writes.iter().any(|w| !w.visible) {
            Cow::Owned(Self::layer(&self.writes, true))
        } else {
            Cow::Borrowed(&self.visible)
        }
    }

    /// The server node at `path` with pending writes overlaid.
    ///
    /// Returns `None` when the server node is unknown and no write fully
    /// covers `path`.
    pub fn calc_complete_event_cache(
        &self,
        path: &Path,
        complete_server: Option<&Node>,
        include_hidden: bool,
    ) -> Option<Node> {
        let merge = self.overlay(include_hidden).child_compound_write(path);
        if merge.is_empty() {
            return complete_server.cloned();
        }
        if complete_server.is_none() && !merge.has_complete_write(&Path::root()) {
            return None;
        }
        let base = complete_server.cloned().unwrap_or_default();
        Some(merge.apply(&base))
    }

    /// A view of this tree scoped to `path`.
    pub fn child_writes(&self, path: &Path) -> WriteTreeRef<'_> {
        WriteTreeRef {
            tree: self,
            path: path.clone(),
        }
    }
}

/// A write tree seen from one view location.
///
/// Every path taken or returned is relative to that location.
#[derive(Debug, Clone)]
pub struct WriteTreeRef<'a> {
    tree: &'a WriteTree,
    path: Path,
}

impl<'a> WriteTreeRef<'a> {
    /// The view location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descends one level.
    pub fn child(&self, key: &ChildKey) -> WriteTreeRef<'a> {
        WriteTreeRef {
            tree: self.tree,
            path: self.path.child(key.clone()),
        }
    }

    /// See [`WriteTree::calc_complete_event_cache`].
    pub fn calc_complete_event_cache(&self, complete_server: Option<&Node>) -> Option<Node> {
        self.tree
            .calc_complete_event_cache(&self.path, complete_server, false)
    }

    /// The children at this location with writes overlaid.
    ///
    /// Without complete server children only written children are returned.
    pub fn calc_event_children(&self, complete_server_children: Option<&Node>) -> Node {
        let visible = &self.tree.visible;
        if let Some(top) = visible.complete_node(&self.path) {
            if top.is_leaf() {
                return Node::empty();
            }
            return Node::from_children(top.children().map(|(k, v)| (k.clone(), v.clone())));
        }
        let merge = visible.child_compound_write(&self.path);
        let mut children = Node::empty();
        if let Some(server) = complete_server_children {
            for (key, child) in server.children() {
                let child_merge = merge.child_compound_write(&Path::from(key.clone()));
                children = children.update_immediate_child(key, child_merge.apply(child));
            }
        }
        for named in merge.complete_children() {
            children = children.update_immediate_child(&named.name, named.node);
        }
        children
    }

    /// The complete event child at `key`, if it can be determined.
    pub fn calc_complete_child(&self, key: &ChildKey, server: &CacheNode) -> Option<Node> {
        let path = self.path.child(key.clone());
        if let Some(shadow) = self.tree.visible.complete_node(&path) {
            return Some(shadow);
        }
        if server.is_complete_for_child(key) {
            let child_merge = self.tree.visible.child_compound_write(&path);
            return Some(child_merge.apply(&server.node().immediate_child(key)));
        }
        None
    }

    /// The data a write fully determines at `path`, if any.
    pub fn shadowing_write(&self, path: &Path) -> Option<Node> {
        self.tree.visible.complete_node(&self.path.join(path))
    }

    /// The first child after `post` under `index` with writes overlaid on
    /// `complete_server`.
    pub fn calc_next_node_after(
        &self,
        complete_server: Option<&Node>,
        post: &NamedNode,
        reverse: bool,
        index: &Index,
    ) -> Option<NamedNode> {
        let merge = self.tree.visible.child_compound_write(&self.path);
        let node = match (merge.root_write(), complete_server) {
            (Some(root), _) => root.clone(),
            (None, Some(server)) => merge.apply(server),
            (None, None) => return None,
        };
        let wanted = if reverse {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        let mut sorted = node.sorted_children(index);
        if reverse {
            sorted.reverse();
        }
        sorted
            .into_iter()
            .find(|candidate| index.compare(candidate, post) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn server() -> Node {
        Node::from_children([("a", Node::from(1)), ("b", Node::from(2))])
    }

    #[test]
    fn ids_must_increase() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("a"), Node::from(1), WriteId::new(2), true)
            .unwrap();
        let err = tree
            .add_overwrite(p("a"), Node::from(1), WriteId::new(2), true)
            .unwrap_err();
        assert!(matches!(err, CoreError::WriteIdNotMonotonic { .. }));
        assert!(tree
            .add_merge(p("a"), CompoundWrite::empty(), WriteId::new(1))
            .is_err());
    }

    #[test]
    fn pending_write_ceiling() {
        let mut tree = WriteTree::new(1);
        tree.add_overwrite(p("a"), Node::from(1), WriteId::new(1), true)
            .unwrap();
        assert_eq!(
            tree.add_overwrite(p("b"), Node::from(1), WriteId::new(2), true),
            Err(CoreError::TooManyPendingWrites { limit: 1 })
        );
    }

    #[test]
    fn later_writes_shadow_earlier() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("a"), Node::from(5), WriteId::new(1), true)
            .unwrap();
        tree.add_overwrite(p("a"), Node::from(6), WriteId::new(2), true)
            .unwrap();
        let event = tree
            .calc_complete_event_cache(&Path::root(), Some(&server()), false)
            .unwrap();
        assert_eq!(event.child(&p("a")), Node::from(6));

        tree.remove_write(WriteId::new(2)).unwrap();
        let event = tree
            .calc_complete_event_cache(&Path::root(), Some(&server()), false)
            .unwrap();
        assert_eq!(event.child(&p("a")), Node::from(5));
    }

    #[test]
    fn removing_every_write_restores_server() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("a"), Node::from(5), WriteId::new(1), true)
            .unwrap();
        tree.add_merge(
            p("b"),
            CompoundWrite::from_writes([(p("x"), Node::from(true))]),
            WriteId::new(2),
        )
        .unwrap();
        tree.remove_write(WriteId::new(1)).unwrap();
        tree.remove_write(WriteId::new(2)).unwrap();

        let event = tree.calc_complete_event_cache(&Path::root(), Some(&server()), false);
        assert_eq!(event, Some(server()));
        assert!(tree.visible_writes().is_empty());
        assert_eq!(
            tree.remove_write(WriteId::new(1)),
            Err(CoreError::UnknownWrite {
                write_id: WriteId::new(1)
            })
        );
    }

    #[test]
    fn unknown_server_needs_covering_write() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("a/x"), Node::from(1), WriteId::new(1), true)
            .unwrap();
        assert!(tree
            .calc_complete_event_cache(&Path::root(), None, false)
            .is_none());
        assert!(tree.calc_complete_event_cache(&p("a"), None, false).is_none());
        assert!(tree.calc_complete_event_cache(&p("z"), None, false).is_none());
        assert_eq!(
            tree.calc_complete_event_cache(&p("a/x"), None, false),
            Some(Node::from(1))
        );

        tree.add_overwrite(
            p("a"),
            Node::from_children([("y", Node::from(2))]),
            WriteId::new(2),
            true,
        )
        .unwrap();
        assert_eq!(
            tree.calc_complete_event_cache(&p("a"), None, false),
            Some(Node::from_children([("y", Node::from(2))]))
        );
    }

    #[test]
    fn hidden_writes_only_with_include_hidden() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("a"), Node::from(9), WriteId::new(1), false)
            .unwrap();
        let plain = tree.calc_complete_event_cache(&Path::root(), Some(&server()), false);
        assert_eq!(plain, Some(server()));
        let hidden = tree
            .calc_complete_event_cache(&Path::root(), Some(&server()), true)
            .unwrap();
        assert_eq!(hidden.child(&p("a")), Node::from(9));
    }

    #[test]
    fn write_tree_ref_calculations() {
        let mut tree = WriteTree::default();
        tree.add_overwrite(p("list/b"), Node::from(20), WriteId::new(1), true)
            .unwrap();
        tree.add_overwrite(p("list/c"), Node::from(30), WriteId::new(2), true)
            .unwrap();
        let writes = tree.child_writes(&p("list"));
        let server_list = server();

        let children = writes.calc_event_children(Some(&server_list));
        assert_eq!(children.child(&p("a")), Node::from(1));
        assert_eq!(children.child(&p("b")), Node::from(20));
        assert_eq!(children.child(&p("c")), Node::from(30));

        let only_written = writes.calc_event_children(None);
        assert_eq!(only_written.num_children(), 2);

        let cache = CacheNode::new(server_list.clone(), false, false);
        assert_eq!(writes.calc_complete_child(&"b".into(), &cache), Some(Node::from(20)));
        assert_eq!(writes.calc_complete_child(&"a".into(), &cache), Some(Node::from(1)));
        assert_eq!(writes.calc_complete_child(&"z".into(), &cache), None);
        assert_eq!(writes.shadowing_write(&p("c")), Some(Node::from(30)));
    }

    #[test]
    fn next_node_after_respects_index_and_direction() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let data = Node::from_children([
            ("a", Node::from(1)),
            ("b", Node::from(2)),
            ("c", Node::from(3)),
        ]);
        let post = NamedNode::new("b", Node::from(2));
        let next = writes
            .calc_next_node_after(Some(&data), &post, false, &Index::Key)
            .unwrap();
        assert_eq!(next.name.as_str(), "c");
        let prev = writes
            .calc_next_node_after(Some(&data), &post, true, &Index::Key)
            .unwrap();
        assert_eq!(prev.name.as_str(), "a");
        assert!(writes
            .calc_next_node_after(None, &post, false, &Index::Key)
            .is_none());
    }
}
