//! Listen providers for the client.

use canopy_core::{ListenProvider, QuerySpec};
use parking_lot::Mutex;
use std::sync::Arc;

/// A start or stop request seen by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenSignal {
    /// The server should start sending data for the query.
    Start(QuerySpec),
    /// The server may stop sending data for the query.
    Stop(QuerySpec),
}

/// A provider that records every signal.
///
/// Clones share the same log, so a test can keep one handle while the
/// client owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingListenProvider {
    signals: Arc<Mutex<Vec<ListenSignal>>>,
}

impl RecordingListenProvider {
    /// Creates a provider with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All signals so far, oldest first.
    pub fn signals(&self) -> Vec<ListenSignal> {
        self.signals.lock().clone()
    }

    /// Queries currently listened to, in start order.
    pub fn active(&self) -> Vec<QuerySpec> {
        let mut active: Vec<QuerySpec> = Vec::new();
        for signal in self.signals.lock().iter() {
            match signal {
                ListenSignal::Start(query) => active.push(query.clone()),
                ListenSignal::Stop(query) => active.retain(|q| q != query),
            }
        }
        active
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.signals.lock().clear();
    }
}

impl ListenProvider for RecordingListenProvider {
    fn start_listening(&mut self, query: &QuerySpec) {
        self.signals.lock().push(ListenSignal::Start(query.clone()));
    }

    fn stop_listening(&mut self, query: &QuerySpec) {
        self.signals.lock().push(ListenSignal::Stop(query.clone()));
    }
}
