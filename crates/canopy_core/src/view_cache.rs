//! Paired event and server caches of one view.

use crate::cache::CacheNode;
use canopy_snap::Node;

/// The two caches a view keeps.
///
/// The event cache holds server data with pending local writes overlaid and
/// is what listeners see. The server cache holds pure server data. Every
/// update returns a new value with one side replaced.
#[derive(Debug, Clone, Default)]
pub struct ViewCache {
    event_cache: CacheNode,
    server_cache: CacheNode,
}

impl ViewCache {
    /// Creates a view cache from both sides.
    pub fn new(event_cache: CacheNode, server_cache: CacheNode) -> Self {
        Self {
            event_cache,
            server_cache,
        }
    }

    /// Both sides empty and incomplete.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a copy with the event side replaced.
    #[must_use]
    pub fn update_event_snap(&self, node: Node, complete: bool, filtered: bool) -> Self {
        Self {
            event_cache: CacheNode::new(node, complete, filtered),
            server_cache: self.server_cache.clone(),
        }
    }

    /// Returns a copy with the server side replaced.
    #[must_use]
    pub fn update_server_snap(&self, node: Node, complete: bool, filtered: bool) -> Self {
        Self {
            event_cache: self.event_cache.clone(),
            server_cache: CacheNode::new(node, complete, filtered),
        }
    }

    /// The event side.
    pub fn event_cache(&self) -> &CacheNode {
        &self.event_cache
    }

    /// The server side.
    pub fn server_cache(&self) -> &CacheNode {
        &self.server_cache
    }

    /// The event snapshot, or `None` when the event side is not fully
    /// initialized.
    pub fn complete_event_snap(&self) -> Option<&Node> {
        self.event_cache
            .is_fully_initialized()
            .then(|| self.event_cache.node())
    }

    /// The server snapshot, or `None` when the server side is not fully
    /// initialized.
    pub fn complete_server_snap(&self) -> Option<&Node> {
        self.server_cache
            .is_fully_initialized()
            .then(|| self.server_cache.node())
    }
}
