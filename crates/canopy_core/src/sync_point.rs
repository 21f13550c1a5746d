//! All views at one location.

use crate::cache::CacheNode;
use crate::change::Event;
use crate::error::CoreResult;
use crate::event_generator::Registration;
use crate::operation::Operation;
use crate::query::QuerySpec;
use crate::types::ListenerId;
use crate::view::View;
use crate::view_cache::ViewCache;
use crate::write_tree::WriteTreeRef;
use canopy_snap::{Node, Path};
use std::collections::BTreeMap;

/// The views at one path, keyed by query identifier.
#[derive(Debug, Default)]
pub struct SyncPoint {
    views: BTreeMap<String, View>,
}

impl SyncPoint {
    /// Creates an empty sync point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no view remains.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The view for `query`, if one exists.
    pub fn view(&self, query: &QuerySpec) -> Option<&View> {
        self.views.get(&query.params.identifier())
    }

    /// All views in identifier order.
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    /// Every view cache, keyed by query identifier.
    pub(crate) fn caches(&self) -> Vec<(String, ViewCache)> {
        self.views
            .iter()
            .map(|(id, view)| (id.clone(), view.cache().clone()))
            .collect()
    }

    /// Puts back caches taken with [`SyncPoint::caches`]. Views created
    /// or dropped since are left alone.
    pub(crate) fn restore_caches(&mut self, caches: Vec<(String, ViewCache)>) {
        for (id, cache) in caches {
            if let Some(view) = self.views.get_mut(&id) {
                view.restore_cache(cache);
            }
        }
    }

    /// Complete server data at `path` below this point, from any view
    /// that holds it.
    pub fn complete_server_cache(&self, path: &Path) -> Option<Node> {
        self.views
            .values()
            .find_map(|view| view.complete_server_cache(path))
    }

    /// Applies `op` (relative to this point) to every view.
    pub fn apply_operation(
        &mut self,
        op: &Operation,
        writes: &WriteTreeRef<'_>,
        complete_server: Option<&Node>,
    ) -> CoreResult<Vec<Event>> {
        let mut events = Vec::new();
        for view in self.views.values_mut() {
            events.extend(view.apply_operation(op, writes, complete_server)?);
        }
        Ok(events)
    }

    /// Attaches `registration` to the view for `query`, creating the view
    /// from `server` if needed.
    ///
    /// Returns the initial events and whether a view was created.
    pub fn add_event_registration(
        &mut self,
        query: QuerySpec,
        registration: Registration,
        server: &CacheNode,
        writes: &WriteTreeRef<'_>,
    ) -> CoreResult<(Vec<Event>, bool)> {
        let id = query.params.identifier();
        let created = !self.views.contains_key(&id);
        if created {
            let view = View::new(query, server, writes)?;
            self.views.insert(id.clone(), view);
        }
        let events = match self.views.get_mut(&id) {
            Some(view) => view.add_registration(registration),
            None => Vec::new(),
        };
        Ok((events, created))
    }

    /// Detaches `listener` from the view for `query`, or from every view
    /// when `query` is `None`.
    ///
    /// Returns the queries whose views were torn down and whether the
    /// listener was found.
    pub fn remove_event_registration(
        &mut self,
        query: Option<&QuerySpec>,
        listener: ListenerId,
    ) -> (Vec<QuerySpec>, bool) {
        let wanted = query.map(|q| q.params.identifier());
        let mut found = false;
        let mut removed = Vec::new();
        self.views.retain(|id, view| {
            if wanted.as_ref().is_some_and(|w| w != id) {
                return true;
            }
            if view.remove_registration(listener) {
                found = true;
                if view.is_empty() {
                    removed.push(view.query().clone());
                    return false;
                }
            }
            true
        });
        (removed, found)
    }

    /// Drops every view, returning each query with its listeners.
    pub fn drain(&mut self) -> Vec<(QuerySpec, Vec<ListenerId>)> {
        std::mem::take(&mut self.views)
            .into_values()
            .map(|view| {
                let listeners = view.registrations().iter().map(Registration::id).collect();
                (view.query().clone(), listeners)
            })
            .collect()
    }
}
