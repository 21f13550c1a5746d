//! Routes operations to views and owns the pending writes.

use crate::cache::CacheNode;
use crate::change::Event;
use crate::compound_write::CompoundWrite;
use crate::config::Config;
use crate::error::CoreResult;
use crate::event_generator::Registration;
use crate::operation::{Operation, OperationSource};
use crate::query::QuerySpec;
use crate::stats::SyncStats;
use crate::sync_point::SyncPoint;
use crate::types::{ListenerId, WriteId};
use crate::view::ViewState;
use crate::view_cache::ViewCache;
use crate::write_tree::{WriteRecord, WriteTree};
use canopy_snap::{Node, Path};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Transport seam: told when the server should start or stop sending data
/// for a query.
pub trait ListenProvider {
    /// The first listener for `query` attached.
    fn start_listening(&mut self, query: &QuerySpec) {
        let _ = query;
    }

    /// The last listener for `query` detached.
    fn stop_listening(&mut self, query: &QuerySpec) {
        let _ = query;
    }
}

/// A provider that ignores every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListenProvider;

impl ListenProvider for NullListenProvider {}

/// The engine: every sync point, the pending writes and the transport seam.
///
/// All methods run to completion; events are returned rather than
/// dispatched. A write or server operation that fails leaves every view
/// cache and the pending writes as they were before the call; only the
/// counters record it.
#[derive(Debug)]
pub struct SyncTree<P: ListenProvider = NullListenProvider> {
    sync_points: BTreeMap<Path, SyncPoint>,
    writes: WriteTree,
    config: Config,
    provider: P,
    stats: SyncStats,
}

impl SyncTree<NullListenProvider> {
    /// Creates a tree that does not talk to a transport.
    pub fn without_provider(config: Config) -> Self {
        Self::new(config, NullListenProvider)
    }
}

impl<P: ListenProvider> SyncTree<P> {
    /// Creates an empty tree.
    pub fn new(config: Config, provider: P) -> Self {
        Self {
            sync_points: BTreeMap::new(),
            writes: WriteTree::new(config.max_pending_writes),
            config,
            provider,
            stats: SyncStats::new(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transport seam.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Counters.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Pending local writes.
    pub fn write_tree(&self) -> &WriteTree {
        &self.writes
    }

    /// Records a local overwrite and returns the events it raises.
    ///
    /// Hidden writes (`visible = false`) raise no events until acknowledged.
    pub fn apply_user_overwrite(
        &mut self,
        path: Path,
        node: Node,
        write_id: WriteId,
        visible: bool,
    ) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            tree.writes
                .add_overwrite(path.clone(), node.clone(), write_id, visible)?;
            tree.stats.record_user_write();
            if !visible {
                return Ok(Vec::new());
            }
            tree.apply_operation(Operation::Overwrite {
                source: OperationSource::User,
                path,
                snap: node,
            })
        })
    }

    /// Records a local merge and returns the events it raises.
    pub fn apply_user_merge(
        &mut self,
        path: Path,
        children: CompoundWrite,
        write_id: WriteId,
    ) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            tree.writes
                .add_merge(path.clone(), children.clone(), write_id)?;
            tree.stats.record_user_write();
            tree.apply_operation(Operation::Merge {
                source: OperationSource::User,
                path,
                children,
            })
        })
    }

    /// Removes an acknowledged (`revert = false`) or rejected
    /// (`revert = true`) write.
    ///
    /// An accepted write's data becomes server data.
    pub fn ack_user_write(&mut self, write_id: WriteId, revert: bool) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            let record: WriteRecord = tree.writes.remove_write(write_id)?;
            tree.stats.record_ack(revert);
            debug!(
                session = %tree.config.session,
                write = %write_id,
                path = %record.path,
                revert,
                "write acknowledged"
            );
            if !record.visible && revert {
                return Ok(Vec::new());
            }
            tree.apply_operation(Operation::AckUserWrite {
                write: record.to_compound_write(),
                path: record.path,
                revert,
            })
        })
    }

    /// Applies server data replacing the node at `path`.
    pub fn apply_server_overwrite(&mut self, path: Path, node: Node) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            tree.stats.record_server_operation();
            tree.apply_operation(Operation::Overwrite {
                source: OperationSource::Server,
                path,
                snap: node,
            })
        })
    }

    /// Applies server data replacing several locations below `path`.
    pub fn apply_server_merge(
        &mut self,
        path: Path,
        children: CompoundWrite,
    ) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            tree.stats.record_server_operation();
            tree.apply_operation(Operation::Merge {
                source: OperationSource::Server,
                path,
                children,
            })
        })
    }

    /// Marks the server data for listens at or below `path` complete.
    pub fn apply_listen_complete(&mut self, path: Path) -> CoreResult<Vec<Event>> {
        self.tracked(|tree| {
            tree.stats.record_server_operation();
            tree.apply_operation(Operation::ListenComplete { path })
        })
    }

    /// Attaches a listener to `query` and returns its initial events.
    ///
    /// A new view asks the provider to start listening.
    pub fn add_event_registration(
        &mut self,
        query: QuerySpec,
        registration: Registration,
    ) -> CoreResult<Vec<Event>> {
        query.params.validate()?;
        let server = self.server_cache_for(&query.path);
        let writes = self.writes.child_writes(&query.path);
        let point = self.sync_points.entry(query.path.clone()).or_default();
        let (events, created) =
            match point.add_event_registration(query.clone(), registration, &server, &writes) {
                Ok(result) => result,
                Err(err) => {
                    self.finish_removal(&query.path, Vec::new());
                    self.stats.record_error();
                    return Err(err);
                }
            };
        if created {
            self.stats.record_view_created();
            debug!(session = %self.config.session, query = %query, "view created");
            self.provider.start_listening(&query);
        }
        self.stats.record_events(events.len());
        Ok(events)
    }

    /// Detaches `listener` from `query`. Returns false if it was not
    /// attached.
    pub fn remove_event_registration(&mut self, query: &QuerySpec, listener: ListenerId) -> bool {
        let Some(point) = self.sync_points.get_mut(&query.path) else {
            return false;
        };
        let (removed, found) = point.remove_event_registration(Some(query), listener);
        self.finish_removal(&query.path, removed);
        found
    }

    /// Detaches `listener` from every view it is attached to.
    pub fn remove_listener(&mut self, listener: ListenerId) -> bool {
        let paths: Vec<Path> = self.sync_points.keys().cloned().collect();
        let mut found = false;
        for path in paths {
            if let Some(point) = self.sync_points.get_mut(&path) {
                let (removed, hit) = point.remove_event_registration(None, listener);
                found |= hit;
                self.finish_removal(&path, removed);
            }
        }
        found
    }

    /// Drops every view at or below `path` without signalling the provider,
    /// returning each affected query with its listeners.
    pub fn revoke_listens(&mut self, path: &Path) -> Vec<(QuerySpec, Vec<ListenerId>)> {
        let paths: Vec<Path> = self
            .sync_points
            .keys()
            .filter(|p| path.contains(p))
            .cloned()
            .collect();
        let mut revoked = Vec::new();
        for p in paths {
            if let Some(mut point) = self.sync_points.remove(&p) {
                for entry in point.drain() {
                    self.stats.record_view_removed();
                    revoked.push(entry);
                }
            }
        }
        debug!(session = %self.config.session, path = %path, views = revoked.len(), "listens revoked");
        revoked
    }

    /// Lifecycle state of the view for `query`, if it exists.
    pub fn view_state(&self, query: &QuerySpec) -> Option<ViewState> {
        self.sync_points
            .get(&query.path)
            .and_then(|point| point.view(query))
            .map(|view| view.state())
    }

    /// Server data at `path` with visible writes overlaid, if it can be
    /// determined.
    pub fn calc_complete_event_cache(&self, path: &Path) -> Option<Node> {
        let server = self.complete_server_cache(path, true);
        self.writes
            .calc_complete_event_cache(path, server.as_ref(), false)
    }

    /// The latest value `query` would report, if known.
    pub fn latest_value(&self, query: &QuerySpec) -> CoreResult<Option<Node>> {
        if let Some(view) = self
            .sync_points
            .get(&query.path)
            .and_then(|point| point.view(query))
        {
            return Ok(view.cache().complete_event_snap().cloned());
        }
        match self.calc_complete_event_cache(&query.path) {
            Some(node) => {
                let filter = query.params.node_filter();
                Ok(Some(filter.update_full_node(&Node::empty(), &node, None)?))
            }
            None => Ok(None),
        }
    }

    fn finish_removal(&mut self, path: &Path, removed: Vec<QuerySpec>) {
        for query in removed {
            self.stats.record_view_removed();
            debug!(session = %self.config.session, query = %query, "view torn down");
            self.provider.stop_listening(&query);
        }
        if self.sync_points.get(path).is_some_and(SyncPoint::is_empty) {
            self.sync_points.remove(path);
        }
    }

    /// Runs `f`, counting its events or its failure.
    ///
    /// On failure the pending writes and every view cache are put back,
    /// so views updated before the failing one do not run ahead.
    fn tracked<F>(&mut self, f: F) -> CoreResult<Vec<Event>>
    where
        F: FnOnce(&mut Self) -> CoreResult<Vec<Event>>,
    {
        let writes = self.writes.clone();
        let caches: Vec<(Path, Vec<(String, ViewCache)>)> = self
            .sync_points
            .iter()
            .map(|(path, point)| (path.clone(), point.caches()))
            .collect();
        match f(self) {
            Ok(events) => {
                self.stats.record_events(events.len());
                Ok(events)
            }
            Err(err) => {
                self.writes = writes;
                for (path, saved) in caches {
                    if let Some(point) = self.sync_points.get_mut(&path) {
                        point.restore_caches(saved);
                    }
                }
                self.stats.record_error();
                debug!(session = %self.config.session, error = %err, "operation failed");
                Err(err)
            }
        }
    }

    /// Best known server data at `path`: complete data from a view at or
    /// above it, else whatever complete children views below it hold.
    fn server_cache_for(&self, path: &Path) -> CacheNode {
        if let Some(node) = self.complete_server_cache(path, true) {
            return CacheNode::new(node, true, false);
        }
        let mut children = Node::empty();
        for (child_path, point) in &self.sync_points {
            let Some(rel) = child_path.relative_to(path) else {
                continue;
            };
            if rel.len() != 1 {
                continue;
            }
            if let (Some(key), Some(node)) = (rel.front(), point.complete_server_cache(&Path::root())) {
                children = children.update_immediate_child(key, node);
            }
        }
        CacheNode::new(children, false, false)
    }

    /// Complete server data at `path` from a view at or above it.
    fn complete_server_cache(&self, path: &Path, include_self: bool) -> Option<Node> {
        self.sync_points
            .iter()
            .filter(|(p, _)| p.contains(path) && (include_self || *p != path))
            .find_map(|(p, point)| {
                let rel = path.relative_to(p)?;
                point.complete_server_cache(&rel)
            })
    }

    fn apply_operation(&mut self, op: Operation) -> CoreResult<Vec<Event>> {
        if self.config.log_operations {
            debug!(session = %self.config.session, op = ?op, "applying operation");
        }
        let op_path = op.path().clone();
        let targets: Vec<Path> = self
            .sync_points
            .keys()
            .filter(|p| match &op {
                Operation::ListenComplete { .. } => op_path.contains(p),
                _ => op_path.contains(p) || p.contains(&op_path),
            })
            .cloned()
            .collect();

        // Ancestors first so descendants see updated server data; events
        // are delivered deepest first.
        let mut raised: Vec<(Path, Vec<Event>)> = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(relative) = op.relative_to(&target) else {
                continue;
            };
            let complete_server = self.complete_server_cache(&target, false);
            let writes = self.writes.child_writes(&target);
            let Some(point) = self.sync_points.get_mut(&target) else {
                continue;
            };
            let events = point.apply_operation(&relative, &writes, complete_server.as_ref())?;
            trace!(session = %self.config.session, path = %target, events = events.len(), "sync point updated");
            raised.push((target, events));
        }
        raised.sort_by(|(a, _), (b, _)| post_order(a, b));
        Ok(raised.into_iter().flat_map(|(_, events)| events).collect())
    }
}

/// Descendants before ancestors, siblings in key order.
fn post_order(a: &Path, b: &Path) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a.contains(b) {
        Ordering::Greater
    } else if b.contains(a) {
        Ordering::Less
    } else {
        a.cmp(b)
    }
}
