//! Applies operations to a view cache and reports the resulting changes.

use crate::accumulator::ChildChangeAccumulator;
use crate::change::Change;
use crate::compound_write::CompoundWrite;
use crate::error::CoreResult;
use crate::filter::{CompleteChildSource, NoCompleteChildSource, NodeFilter};
use crate::operation::{Operation, OperationSource};
use crate::view_cache::ViewCache;
use crate::write_tree::WriteTreeRef;
use canopy_snap::{ChildKey, Index, NamedNode, Node, Path, Priority};
use std::collections::BTreeSet;

/// Outcome of processing one operation.
#[derive(Debug, Clone)]
pub struct ProcessorResult {
    /// The new cache.
    pub view_cache: ViewCache,
    /// Net changes, in no particular order, plus a trailing value change
    /// when the complete event snapshot changed.
    pub changes: Vec<Change>,
}

/// Which part of the event cache an operation may have touched.
enum Scope {
    /// The whole node, including its priority.
    All,
    /// Only these direct children.
    Children(BTreeSet<ChildKey>),
}

impl Scope {
    fn of_path(path: &Path) -> Self {
        match path.front() {
            None => Scope::All,
            Some(key) if key.is_priority() => Scope::All,
            Some(key) => Scope::Children(BTreeSet::from([key.clone()])),
        }
    }

    fn of_merge(path: &Path, children: &CompoundWrite) -> Self {
        if !path.is_empty() {
            return Self::of_path(path);
        }
        let mut keys = BTreeSet::new();
        for (child_path, _) in children.iter() {
            match child_path.front() {
                Some(key) if !key.is_priority() => {
                    keys.insert(key.clone());
                }
                _ => return Scope::All,
            }
        }
        Scope::Children(keys)
    }
}

/// Finds the children that slide into a limited window, from pending
/// writes over the server cache.
struct WriteTreeCompleteChildSource<'a, 'w> {
    writes: &'a WriteTreeRef<'w>,
    cache: &'a ViewCache,
    complete_server: Option<&'a Node>,
}

impl CompleteChildSource for WriteTreeCompleteChildSource<'_, '_> {
    fn child_after(&self, index: &Index, post: &NamedNode, reverse: bool) -> Option<NamedNode> {
        let server = self
            .complete_server
            .or_else(|| self.cache.complete_server_snap());
        self.writes.calc_next_node_after(server, post, reverse, index)
    }
}

/// Applies operations to the caches of one query.
#[derive(Debug)]
pub struct ViewProcessor {
    filter: Box<dyn NodeFilter>,
}

impl ViewProcessor {
    /// Creates a processor using `filter` for both caches.
    pub fn new(filter: Box<dyn NodeFilter>) -> Self {
        Self { filter }
    }

    /// The query filter.
    pub fn filter(&self) -> &dyn NodeFilter {
        self.filter.as_ref()
    }

    /// Applies `op`, whose path is relative to the view location.
    ///
    /// `writes` must already reflect the operation for user writes and must
    /// no longer contain the write for acknowledgements.
    pub fn apply_operation(
        &self,
        old: &ViewCache,
        op: &Operation,
        writes: &WriteTreeRef<'_>,
        complete_server: Option<&Node>,
    ) -> CoreResult<ProcessorResult> {
        let mut acc = ChildChangeAccumulator::new();
        let (with_server, scope) = match op {
            Operation::Overwrite { source, path, snap } => {
                let cache = match source {
                    OperationSource::Server => {
                        self.apply_server_overwrite(old, path, snap)?
                    }
                    OperationSource::User => old.clone(),
                };
                (cache, Scope::of_path(path))
            }
            Operation::Merge {
                source,
                path,
                children,
            } => {
                let cache = match source {
                    OperationSource::Server => {
                        self.apply_server_merge(old, path, children)?
                    }
                    OperationSource::User => old.clone(),
                };
                (cache, Scope::of_merge(path, children))
            }
            Operation::AckUserWrite {
                path,
                revert,
                write,
            } => {
                let cache = if *revert {
                    old.clone()
                } else {
                    self.apply_server_merge(old, path, write)?
                };
                (cache, Scope::of_merge(path, write))
            }
            Operation::ListenComplete { path } => {
                let server = old.server_cache();
                let cache = old.update_server_snap(
                    server.node().clone(),
                    server.is_fully_initialized() || path.is_empty(),
                    server.is_filtered(),
                );
                (cache, Scope::of_path(path))
            }
        };

        let view_cache =
            self.recompute_event_cache(&with_server, scope, writes, complete_server, &mut acc)?;

        let mut changes = acc.into_changes();
        let old_event = old.event_cache();
        if let Some(new_snap) = view_cache.complete_event_snap() {
            if !old_event.is_fully_initialized() || !old_event.node().same_as(new_snap) {
                changes.push(Change::value(new_snap.clone()));
            }
        }
        Ok(ProcessorResult {
            view_cache,
            changes,
        })
    }

    fn apply_server_overwrite(
        &self,
        old: &ViewCache,
        path: &Path,
        snap: &Node,
    ) -> CoreResult<ViewCache> {
        let server = old.server_cache();
        let filter = self.filter.as_ref();
        let new_node = match path.front() {
            None => filter.update_full_node(server.node(), snap, None)?,
            Some(_) if filter.filters_nodes() && !server.is_filtered() => {
                let full = server.node().update_child(path, snap.clone());
                filter.update_full_node(server.node(), &full, None)?
            }
            Some(key) => {
                if !server.is_complete_for_path(path) && path.len() > 1 {
                    return Ok(old.clone());
                }
                let rest = path.pop_front();
                let child = server.node().immediate_child(key).update_child(&rest, snap.clone());
                if key.is_priority() {
                    let priority = child
                        .value()
                        .and_then(|v| Priority::from_scalar(v).ok());
                    filter.update_priority(server.node(), priority)
                } else {
                    filter.update_child(server.node(), key, child, &NoCompleteChildSource, None)?
                }
            }
        };
        Ok(old.update_server_snap(
            new_node,
            server.is_fully_initialized() || path.is_empty(),
            filter.filters_nodes(),
        ))
    }

    fn apply_server_merge(
        &self,
        old: &ViewCache,
        path: &Path,
        children: &CompoundWrite,
    ) -> CoreResult<ViewCache> {
        let mut cache = old.clone();
        for (child_path, node) in children.iter() {
            cache = self.apply_server_overwrite(&cache, &path.join(child_path), node)?;
        }
        Ok(cache)
    }

    /// Rebuilds the touched part of the event cache from the server cache
    /// and the pending writes.
    fn recompute_event_cache(
        &self,
        cache: &ViewCache,
        scope: Scope,
        writes: &WriteTreeRef<'_>,
        complete_server: Option<&Node>,
        acc: &mut ChildChangeAccumulator,
    ) -> CoreResult<ViewCache> {
        let filter = self.filter.as_ref();
        let server = cache.server_cache();
        let old_event = cache.event_cache().node();
        let shadowing = writes.shadowing_write(&Path::root());

        let new_event = match scope {
            Scope::All => {
                let node = match (&shadowing, cache.complete_server_snap()) {
                    (Some(written), _) => written.clone(),
                    (None, Some(server_node)) => writes
                        .calc_complete_event_cache(Some(server_node))
                        .unwrap_or_default(),
                    (None, None) => writes.calc_event_children(Some(server.node())),
                };
                filter.update_full_node(old_event, &node, Some(acc))?
            }
            Scope::Children(keys) => {
                let source = WriteTreeCompleteChildSource {
                    writes,
                    cache,
                    complete_server,
                };
                let mut event = old_event.clone();
                for key in &keys {
                    let new_child = writes.calc_complete_child(key, server);
                    event = match new_child {
                        Some(child) => filter.update_child(&event, key, child, &source, Some(acc))?,
                        None if event.has_child(key) => {
                            filter.update_child(&event, key, Node::empty(), &source, Some(acc))?
                        }
                        None => event,
                    };
                }
                if event.is_empty() {
                    if let Some(server_node) = cache.complete_server_snap() {
                        let complete = writes
                            .calc_complete_event_cache(Some(server_node))
                            .unwrap_or_default();
                        if complete.is_leaf() {
                            event = filter.update_full_node(&event, &complete, Some(acc))?;
                        }
                    }
                }
                event
            }
        };

        let complete = server.is_fully_initialized() || shadowing.is_some();
        Ok(cache.update_event_snap(new_event, complete, filter.filters_nodes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::filter::IndexedFilter;
    use crate::types::WriteId;
    use crate::write_tree::WriteTree;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn processor() -> ViewProcessor {
        ViewProcessor::new(Box::new(IndexedFilter::new(Index::Priority)))
    }

    fn server_overwrite(path: &str, snap: Node) -> Operation {
        Operation::Overwrite {
            source: OperationSource::Server,
            path: p(path),
            snap,
        }
    }

    fn kinds(changes: &[Change]) -> Vec<(Option<String>, ChangeKind)> {
        let mut out: Vec<_> = changes
            .iter()
            .map(|c| (c.key().map(ToString::to_string), c.kind()))
            .collect();
        out.sort();
        out
    }

    fn ab() -> Node {
        Node::from_children([("a", Node::from(1)), ("b", Node::from(2))])
    }

    #[test]
    fn initial_server_data_adds_children_and_value() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let result = processor()
            .apply_operation(&ViewCache::empty(), &server_overwrite("", ab()), &writes, None)
            .unwrap();

        assert_eq!(result.view_cache.complete_event_snap(), Some(&ab()));
        assert_eq!(
            kinds(&result.changes),
            vec![
                (None, ChangeKind::Value),
                (Some("a".into()), ChangeKind::ChildAdded),
                (Some("b".into()), ChangeKind::ChildAdded),
            ]
        );
    }

    #[test]
    fn identical_overwrite_emits_nothing() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let proc = processor();
        let first = proc
            .apply_operation(&ViewCache::empty(), &server_overwrite("", ab()), &writes, None)
            .unwrap();
        let second = proc
            .apply_operation(&first.view_cache, &server_overwrite("", ab()), &writes, None)
            .unwrap();
        assert!(second.changes.is_empty());

        let child = proc
            .apply_operation(&first.view_cache, &server_overwrite("a", Node::from(1)), &writes, None)
            .unwrap();
        assert!(child.changes.is_empty());
    }

    #[test]
    fn deep_update_for_unknown_child_is_ignored() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let result = processor()
            .apply_operation(
                &ViewCache::empty(),
                &server_overwrite("a/b", Node::from(1)),
                &writes,
                None,
            )
            .unwrap();
        assert!(result.view_cache.server_cache().node().is_empty());
        assert!(result.changes.is_empty());
    }

    #[test]
    fn user_write_changes_event_side_only() {
        let mut tree = WriteTree::default();
        let proc = processor();
        let base = proc
            .apply_operation(
                &ViewCache::empty(),
                &server_overwrite("", ab()),
                &tree.child_writes(&Path::root()),
                None,
            )
            .unwrap()
            .view_cache;

        tree.add_overwrite(p("a"), Node::from(5), WriteId::new(1), true)
            .unwrap();
        let op = Operation::Overwrite {
            source: OperationSource::User,
            path: p("a"),
            snap: Node::from(5),
        };
        let result = proc
            .apply_operation(&base, &op, &tree.child_writes(&Path::root()), None)
            .unwrap();

        assert_eq!(result.view_cache.server_cache().node(), &ab());
        assert_eq!(
            result.view_cache.event_cache().node().child(&p("a")),
            Node::from(5)
        );
        assert_eq!(
            kinds(&result.changes),
            vec![
                (None, ChangeKind::Value),
                (Some("a".into()), ChangeKind::ChildChanged),
            ]
        );
    }

    #[test]
    fn revert_restores_server_data() {
        let mut tree = WriteTree::default();
        let proc = processor();
        let base = proc
            .apply_operation(
                &ViewCache::empty(),
                &server_overwrite("", ab()),
                &tree.child_writes(&Path::root()),
                None,
            )
            .unwrap()
            .view_cache;
        tree.add_overwrite(p("c"), Node::from(3), WriteId::new(1), true)
            .unwrap();
        let user = Operation::Overwrite {
            source: OperationSource::User,
            path: p("c"),
            snap: Node::from(3),
        };
        let written = proc
            .apply_operation(&base, &user, &tree.child_writes(&Path::root()), None)
            .unwrap()
            .view_cache;

        tree.remove_write(WriteId::new(1)).unwrap();
        let revert = Operation::AckUserWrite {
            path: p("c"),
            revert: true,
            write: CompoundWrite::from_node(Node::from(3)),
        };
        let result = proc
            .apply_operation(&written, &revert, &tree.child_writes(&Path::root()), None)
            .unwrap();
        assert_eq!(result.view_cache.complete_event_snap(), Some(&ab()));
        assert_eq!(
            kinds(&result.changes),
            vec![
                (None, ChangeKind::Value),
                (Some("c".into()), ChangeKind::ChildRemoved),
            ]
        );
    }

    #[test]
    fn listen_complete_on_empty_location() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let result = processor()
            .apply_operation(
                &ViewCache::empty(),
                &Operation::ListenComplete { path: Path::root() },
                &writes,
                None,
            )
            .unwrap();
        assert_eq!(result.view_cache.complete_event_snap(), Some(&Node::empty()));
        assert_eq!(kinds(&result.changes), vec![(None, ChangeKind::Value)]);
    }

    #[test]
    fn server_merge_touches_listed_children() {
        let tree = WriteTree::default();
        let writes = tree.child_writes(&Path::root());
        let proc = processor();
        let base = proc
            .apply_operation(&ViewCache::empty(), &server_overwrite("", ab()), &writes, None)
            .unwrap()
            .view_cache;
        let merge = Operation::Merge {
            source: OperationSource::Server,
            path: Path::root(),
            children: CompoundWrite::from_writes([
                (p("a"), Node::empty()),
                (p("c"), Node::from(3)),
            ]),
        };
        let result = proc.apply_operation(&base, &merge, &writes, None).unwrap();
        assert_eq!(
            result.view_cache.complete_event_snap(),
            Some(&Node::from_children([("b", Node::from(2)), ("c", Node::from(3))]))
        );
        assert!(result.view_cache.complete_event_snap().is_some());
        assert_eq!(
            kinds(&result.changes),
            vec![
                (None, ChangeKind::Value),
                (Some("a".into()), ChangeKind::ChildRemoved),
                (Some("c".into()), ChangeKind::ChildAdded),
            ]
        );
    }
}
