//! Engine counters.
//!
//! ```rust,ignore
//! let tree = SyncTree::new(Config::default(), NullListenProvider);
//! // apply operations...
//! let stats = tree.stats().snapshot();
//! println!("events: {}", stats.events_raised);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one sync tree.
///
/// All counters are atomic and only ever increase.
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Server operations applied.
    server_operations: AtomicU64,
    /// Local writes added.
    user_writes: AtomicU64,
    /// Writes acknowledged by the server.
    acks: AtomicU64,
    /// Writes rejected by the server.
    reverts: AtomicU64,
    /// Events handed to listeners.
    events_raised: AtomicU64,
    /// Views created.
    views_created: AtomicU64,
    /// Views torn down.
    views_removed: AtomicU64,
    /// Operations that failed.
    errors: AtomicU64,
}

impl SyncStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_server_operation(&self) {
        self.server_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_user_write(&self) {
        self.user_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack(&self, revert: bool) {
        if revert {
            self.reverts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.acks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_events(&self, count: usize) {
        self.events_raised.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_view_created(&self) {
        self.views_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_view_removed(&self) {
        self.views_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of server operations applied.
    pub fn server_operations(&self) -> u64 {
        self.server_operations.load(Ordering::Relaxed)
    }

    /// Returns the number of local writes added.
    pub fn user_writes(&self) -> u64 {
        self.user_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of acknowledged writes.
    pub fn acks(&self) -> u64 {
        self.acks.load(Ordering::Relaxed)
    }

    /// Returns the number of reverted writes.
    pub fn reverts(&self) -> u64 {
        self.reverts.load(Ordering::Relaxed)
    }

    /// Returns the number of events raised.
    pub fn events_raised(&self) -> u64 {
        self.events_raised.load(Ordering::Relaxed)
    }

    /// Returns the number of views created.
    pub fn views_created(&self) -> u64 {
        self.views_created.load(Ordering::Relaxed)
    }

    /// Returns the number of views torn down.
    pub fn views_removed(&self) -> u64 {
        self.views_removed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            server_operations: self.server_operations(),
            user_writes: self.user_writes(),
            acks: self.acks(),
            reverts: self.reverts(),
            events_raised: self.events_raised(),
            views_created: self.views_created(),
            views_removed: self.views_removed(),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Server operations applied.
    pub server_operations: u64,
    /// Local writes added.
    pub user_writes: u64,
    /// Writes acknowledged.
    pub acks: u64,
    /// Writes reverted.
    pub reverts: u64,
    /// Events raised.
    pub events_raised: u64,
    /// Views created.
    pub views_created: u64,
    /// Views torn down.
    pub views_removed: u64,
    /// Failed operations.
    pub errors: u64,
}
