//! One query's caches, listeners and lifecycle.

use crate::cache::CacheNode;
use crate::change::{Change, Event};
use crate::error::CoreResult;
use crate::event_generator::{EventGenerator, Registration};
use crate::operation::Operation;
use crate::query::QuerySpec;
use crate::types::ListenerId;
use crate::view_cache::ViewCache;
use crate::view_processor::ViewProcessor;
use crate::write_tree::WriteTreeRef;
use canopy_snap::{Node, Path};
use std::fmt;

/// Lifecycle of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// Created, no listener attached yet.
    Uninitialized,
    /// Listeners attached, waiting for the first complete server data.
    ServerPending,
    /// Server data complete, query keeps every child.
    Active,
    /// Server data complete, query drops children outside its window.
    FilteredActive,
    /// Last listener detached. Terminal.
    TornDown,
}

impl ViewState {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ViewState::Uninitialized => "uninitialized",
            ViewState::ServerPending => "server-pending",
            ViewState::Active => "active",
            ViewState::FilteredActive => "filtered-active",
            ViewState::TornDown => "torn-down",
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query at one location.
///
/// The view owns the only mutable reference to its [`ViewCache`]; every
/// operation replaces the cache with a new value.
#[derive(Debug)]
pub struct View {
    query: QuerySpec,
    processor: ViewProcessor,
    generator: EventGenerator,
    cache: ViewCache,
    registrations: Vec<Registration>,
    torn_down: bool,
}

impl View {
    /// Creates a view seeded from known server data and pending writes.
    ///
    /// `server` is unfiltered data at the query location.
    pub fn new(query: QuerySpec, server: &CacheNode, writes: &WriteTreeRef<'_>) -> CoreResult<Self> {
        let filter = query.params.node_filter();
        let server_node = filter.update_full_node(&Node::empty(), server.node(), None)?;

        let shadowing = writes.shadowing_write(&Path::root());
        let event_source = match (&shadowing, server.is_fully_initialized()) {
            (Some(written), _) => written.clone(),
            (None, true) => writes
                .calc_complete_event_cache(Some(server.node()))
                .unwrap_or_default(),
            (None, false) => writes.calc_event_children(Some(server.node())),
        };
        let event_node = filter.update_full_node(&Node::empty(), &event_source, None)?;

        let filtered = filter.filters_nodes();
        let cache = ViewCache::new(
            CacheNode::new(
                event_node,
                server.is_fully_initialized() || shadowing.is_some(),
                filtered,
            ),
            CacheNode::new(server_node, server.is_fully_initialized(), filtered),
        );
        let generator = EventGenerator::new(query.path.clone(), filter.index().clone());

        Ok(Self {
            query,
            processor: ViewProcessor::new(filter),
            generator,
            cache,
            registrations: Vec::new(),
            torn_down: false,
        })
    }

    /// The query this view answers.
    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Current caches.
    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    /// Attached listeners, in registration order.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Returns true if no listener is attached.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ViewState {
        if self.torn_down {
            ViewState::TornDown
        } else if self.cache.server_cache().is_fully_initialized() {
            if self.processor.filter().filters_nodes() {
                ViewState::FilteredActive
            } else {
                ViewState::Active
            }
        } else if self.registrations.is_empty() {
            ViewState::Uninitialized
        } else {
            ViewState::ServerPending
        }
    }

    /// Attaches a listener and returns the events it sees immediately.
    pub fn add_registration(&mut self, registration: Registration) -> Vec<Event> {
        let events = self.initial_events(&registration);
        self.registrations.push(registration);
        events
    }

    /// Detaches a listener. Returns false if it was not attached.
    ///
    /// Removing the last listener tears the view down.
    pub fn remove_registration(&mut self, listener: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id() != listener);
        let removed = self.registrations.len() != before;
        if removed && self.registrations.is_empty() {
            self.torn_down = true;
        }
        removed
    }

    /// Events replaying the current complete snapshot for one listener:
    /// an added event per child in index order, then the value.
    pub fn initial_events(&self, registration: &Registration) -> Vec<Event> {
        let Some(snap) = self.cache.complete_event_snap() else {
            return Vec::new();
        };
        let mut changes: Vec<Change> = snap
            .children()
            .map(|(key, child)| Change::child_added(key.clone(), child.clone()))
            .collect();
        changes.push(Change::value(snap.clone()));
        self.generator
            .generate_events(changes, snap, std::slice::from_ref(registration))
    }

    /// Applies `op` and returns the events for attached listeners.
    ///
    /// On error the cache is left unchanged.
    pub fn apply_operation(
        &mut self,
        op: &Operation,
        writes: &WriteTreeRef<'_>,
        complete_server: Option<&Node>,
    ) -> CoreResult<Vec<Event>> {
        let result = self
            .processor
            .apply_operation(&self.cache, op, writes, complete_server)?;
        self.cache = result.view_cache;
        Ok(self.generator.generate_events(
            result.changes,
            self.cache.event_cache().node(),
            &self.registrations,
        ))
    }

    /// Puts back a cache taken from [`View::cache`] before a failed
    /// operation.
    pub(crate) fn restore_cache(&mut self, cache: ViewCache) {
        self.cache = cache;
    }

    /// Complete server data at `path` below this view, if the view holds it.
    pub fn complete_server_cache(&self, path: &Path) -> Option<Node> {
        let server = self.cache.complete_server_snap()?;
        let answers = self.query.params.loads_all_data()
            || path
                .front()
                .is_some_and(|key| !server.immediate_child(key).is_empty());
        answers.then(|| server.child(path))
    }
}
