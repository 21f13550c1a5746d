//! Listener-facing client over the sync tree.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{decode_children, decode_node, decode_path, ServerOperation, UserOperation};
use canopy_core::{
    ChangeKind, CompoundWrite, Event, ListenProvider, ListenerId, NullListenProvider, QuerySpec,
    Registration, StatsSnapshot, SyncTree, WriteId,
};
use canopy_snap::{Node, Path};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives events for one listener.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Receives the reason a listener was cancelled by the server.
pub type CancelCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

struct Listener {
    query: QuerySpec,
    callback: EventCallback,
    on_cancel: Option<CancelCallback>,
}

/// The application-facing side of the engine.
///
/// Local writes and server operations go in; events come out through the
/// registered callbacks, in delivery order. Each call returns the events it
/// delivered.
pub struct Client<P: ListenProvider = NullListenProvider> {
    config: ClientConfig,
    tree: SyncTree<P>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    next_write: u64,
}

impl Client<NullListenProvider> {
    /// Creates a client without a transport.
    pub fn offline(config: ClientConfig) -> Self {
        Self::new(config, NullListenProvider)
    }
}

impl<P: ListenProvider> Client<P> {
    /// Creates a client that signals listens to `provider`.
    pub fn new(config: ClientConfig, provider: P) -> Self {
        Self {
            tree: SyncTree::new(config.core.clone(), provider),
            config,
            listeners: BTreeMap::new(),
            next_listener: 1,
            next_write: 1,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying engine.
    pub fn sync_tree(&self) -> &SyncTree<P> {
        &self.tree
    }

    /// The transport seam.
    pub fn provider(&self) -> &P {
        self.tree.provider()
    }

    /// Engine counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.tree.stats().snapshot()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Registers `callback` for the given event kinds of `query`.
    ///
    /// Events for data already known are delivered before this returns.
    pub fn subscribe(
        &mut self,
        query: QuerySpec,
        kinds: impl IntoIterator<Item = ChangeKind>,
        callback: EventCallback,
    ) -> ClientResult<ListenerId> {
        let id = ListenerId::new(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(
            id,
            Listener {
                query: query.clone(),
                callback,
                on_cancel: None,
            },
        );
        match self
            .tree
            .add_event_registration(query, Registration::new(id, kinds))
        {
            Ok(events) => {
                self.dispatch(&events);
                Ok(id)
            }
            Err(err) => {
                self.listeners.remove(&id);
                Err(err.into())
            }
        }
    }

    /// Registers a value listener.
    pub fn subscribe_value(
        &mut self,
        query: QuerySpec,
        callback: EventCallback,
    ) -> ClientResult<ListenerId> {
        self.subscribe(query, [ChangeKind::Value], callback)
    }

    /// Registers a listener for the four child event kinds.
    pub fn subscribe_children(
        &mut self,
        query: QuerySpec,
        callback: EventCallback,
    ) -> ClientResult<ListenerId> {
        let kinds = Registration::children(ListenerId::new(0)).kinds().clone();
        self.subscribe(query, kinds, callback)
    }

    /// Sets the callback told when the server revokes `listener`.
    pub fn on_cancel(&mut self, listener: ListenerId, callback: CancelCallback) -> ClientResult<()> {
        let entry = self
            .listeners
            .get_mut(&listener)
            .ok_or(ClientError::UnknownListener(listener))?;
        entry.on_cancel = Some(callback);
        Ok(())
    }

    /// Removes a listener. Other listeners of the same query keep receiving
    /// events.
    pub fn unsubscribe(&mut self, listener: ListenerId) -> ClientResult<()> {
        let entry = self
            .listeners
            .remove(&listener)
            .ok_or(ClientError::UnknownListener(listener))?;
        self.tree.remove_event_registration(&entry.query, listener);
        Ok(())
    }

    /// Writes `node` at `path` and returns the allocated write id.
    pub fn set(&mut self, path: &str, node: Node) -> ClientResult<WriteId> {
        let path = Path::parse(path)?;
        let write_id = self.allocate_write();
        let events = self.tree.apply_user_overwrite(path, node, write_id, true)?;
        self.dispatch(&events);
        Ok(write_id)
    }

    /// Writes each `(relative path, node)` pair below `path` as one write.
    pub fn update<I>(&mut self, path: &str, children: I) -> ClientResult<WriteId>
    where
        I: IntoIterator<Item = (Path, Node)>,
    {
        let path = Path::parse(path)?;
        let write_id = self.allocate_write();
        let events =
            self.tree
                .apply_user_merge(path, CompoundWrite::from_writes(children), write_id)?;
        self.dispatch(&events);
        Ok(write_id)
    }

    /// Applies a local write carrying its own write id.
    pub fn apply_user_operation(&mut self, op: UserOperation) -> ClientResult<Vec<Event>> {
        let write_id = WriteId::new(op.write_id());
        let events = match &op {
            UserOperation::Overwrite { path, data, .. } => {
                let (path, node) = (decode_path(path)?, decode_node(data)?);
                self.tree.apply_user_overwrite(path, node, write_id, true)?
            }
            UserOperation::Merge { path, children, .. } => {
                let (path, children) = (decode_path(path)?, decode_children(children)?);
                self.tree.apply_user_merge(path, children, write_id)?
            }
        };
        self.next_write = self.next_write.max(write_id.as_u64().saturating_add(1));
        self.dispatch(&events);
        Ok(events)
    }

    /// Applies an operation pushed by the server.
    pub fn apply_server_operation(&mut self, op: ServerOperation) -> ClientResult<Vec<Event>> {
        debug!(session = %self.config.core.session, op = op.name(), "server operation");
        let events = match &op {
            ServerOperation::Overwrite { path, data } => {
                let (path, node) = (decode_path(path)?, decode_node(data)?);
                self.tree.apply_server_overwrite(path, node)?
            }
            ServerOperation::Merge { path, children } => {
                let (path, children) = (decode_path(path)?, decode_children(children)?);
                self.tree.apply_server_merge(path, children)?
            }
            ServerOperation::AckUserWrite { write_id, revert } => {
                self.tree.ack_user_write(WriteId::new(*write_id), *revert)?
            }
            ServerOperation::ListenComplete { path } => {
                self.tree.apply_listen_complete(decode_path(path)?)?
            }
            ServerOperation::ListenRevoked { path, code } => {
                let parsed = decode_path(path)?;
                let error = ClientError::revoked(code.clone(), path.clone());
                for (query, listeners) in self.tree.revoke_listens(&parsed) {
                    warn!(session = %self.config.core.session, query = %query, code = %code, "listen revoked");
                    for id in listeners {
                        if let Some(listener) = self.listeners.remove(&id) {
                            if let Some(on_cancel) = listener.on_cancel {
                                self.guarded(|| on_cancel(&error));
                            }
                        }
                    }
                }
                Vec::new()
            }
        };
        self.dispatch(&events);
        Ok(events)
    }

    /// The latest value `query` reports, if the engine knows it.
    pub fn latest_value(&self, query: &QuerySpec) -> ClientResult<Option<Node>> {
        Ok(self.tree.latest_value(query)?)
    }

    fn allocate_write(&mut self) -> WriteId {
        let id = WriteId::new(self.next_write);
        self.next_write = self.next_write.saturating_add(1);
        id
    }

    fn dispatch(&self, events: &[Event]) {
        for event in events {
            if let Some(listener) = self.listeners.get(&event.listener) {
                let callback = Arc::clone(&listener.callback);
                self.guarded(|| callback(event));
            }
        }
    }

    fn guarded(&self, f: impl FnOnce()) {
        if !self.config.guard_callbacks {
            f();
            return;
        }
        if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            warn!(session = %self.config.core.session, "listener callback panicked");
        }
    }
}

impl<P: ListenProvider> std::fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.config.core.session)
            .field("listeners", &self.listeners.len())
            .field("next_write", &self.next_write)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collector() -> (EventCallback, Arc<Mutex<Vec<Event>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (Arc::new(move |e: &Event| sink.lock().push(e.clone())), log)
    }

    fn root() -> QuerySpec {
        QuerySpec::default_at(Path::root())
    }

    #[test]
    fn write_ids_are_allocated_in_order() {
        let mut client = Client::offline(ClientConfig::default());
        assert_eq!(client.set("/a", Node::from(1)).unwrap(), WriteId::new(1));
        assert_eq!(
            client
                .update("/", [(Path::parse("b").unwrap(), Node::from(2))])
                .unwrap(),
            WriteId::new(2)
        );
        client
            .apply_user_operation(UserOperation::Overwrite {
                write_id: 10,
                path: "/c".into(),
                data: serde_json::json!(3),
            })
            .unwrap();
        assert_eq!(client.set("/d", Node::from(4)).unwrap(), WriteId::new(11));
    }

    #[test]
    fn highest_write_id_exhausts_allocation() {
        let mut client = Client::offline(ClientConfig::default());
        let (callback, log) = collector();
        client.subscribe_value(root(), callback).unwrap();

        let events = client
            .apply_user_operation(UserOperation::Overwrite {
                write_id: u64::MAX,
                path: "/".into(),
                data: serde_json::json!({"a": 1}),
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(
            client.latest_value(&root()).unwrap(),
            Some(Node::from_children([("a", Node::from(1))]))
        );

        assert!(matches!(
            client.set("/b", Node::from(2)),
            Err(ClientError::Core(_))
        ));
        assert_eq!(
            client.latest_value(&root()).unwrap(),
            Some(Node::from_children([("a", Node::from(1))]))
        );
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn callbacks_receive_events() {
        let mut client = Client::offline(ClientConfig::default());
        let (callback, log) = collector();
        let id = client.subscribe_value(root(), callback).unwrap();
        client.set("/", Node::from(7)).unwrap();
        {
            let events = log.lock();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].listener, id);
            assert_eq!(events[0].node, Node::from(7));
        }

        client.unsubscribe(id).unwrap();
        client.set("/", Node::from(8)).unwrap();
        assert_eq!(log.lock().len(), 1);
        assert_eq!(
            client.unsubscribe(id),
            Err(ClientError::UnknownListener(id))
        );
    }

    #[test]
    fn panicking_callback_is_contained() {
        let mut client = Client::offline(ClientConfig::default());
        let (callback, log) = collector();
        client
            .subscribe_value(root(), Arc::new(|_: &Event| panic!("listener bug")))
            .unwrap();
        client.subscribe_value(root(), callback).unwrap();
        client.set("/", Node::from(1)).unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn malformed_server_payload_is_rejected() {
        let mut client = Client::offline(ClientConfig::default());
        let err = client
            .apply_server_operation(ServerOperation::Overwrite {
                path: "/a".into(),
                data: serde_json::json!({"bad#key": 1}),
            })
            .unwrap_err();
        assert!(matches!(err, ClientError::MalformedPayload { .. }));
        assert_eq!(client.stats().server_operations, 0);
    }

    #[test]
    fn invalid_query_does_not_leak_listener() {
        let mut client = Client::offline(ClientConfig::default());
        let (callback, _) = collector();
        let query = QuerySpec::new(
            Path::root(),
            canopy_core::QueryParams::new().limit_to_last(0),
        );
        assert!(client.subscribe_value(query, callback).is_err());
        assert_eq!(client.listener_count(), 0);
    }
}
