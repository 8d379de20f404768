//! Subscription registry.
//!
//! One mutex guards both the subscription map and the feed's closed flag, so
//! subscribe racing against teardown resolves to exactly one winner: a
//! subscription is either fully registered before shutdown drains the map, or
//! rejected with [`FeedError::Closed`]. Dispatch takes a snapshot under the
//! lock and enqueues outside it; the lock is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::FeedError;
use crate::queue::{EventQueue, OverflowPolicy};

/// Registry-side record of one subscriber.
#[derive(Debug)]
pub(crate) struct SubscriberEntry {
    /// Exact event type to match, or empty to match everything.
    pub(crate) event_type: String,
    pub(crate) queue: Arc<EventQueue>,
    /// Capacity-1 channel; at most one fatal error is ever sent.
    pub(crate) error_tx: mpsc::Sender<FeedError>,
    pub(crate) policy: OverflowPolicy,
}

#[derive(Debug, Default)]
struct RegistryState {
    subscriptions: HashMap<String, SubscriberEntry>,
    closed: bool,
}

/// Concurrency-safe subscription collection, keyed by subscription id.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Rejected once the feed is closed.
    pub(crate) fn add(&self, id: String, entry: SubscriberEntry) -> Result<(), FeedError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(FeedError::Closed);
        }
        debug!(subscription = %id, event_type = %entry.event_type, "subscription registered");
        state.subscriptions.insert(id, entry);
        Ok(())
    }

    /// Remove a subscriber and close its queue. Removing an unknown id is a
    /// no-op, which makes unsubscribe idempotent.
    pub(crate) fn remove(&self, id: &str) -> bool {
        let entry = self.state.lock().unwrap().subscriptions.remove(id);
        match entry {
            Some(entry) => {
                debug!(subscription = %id, "subscription removed");
                entry.queue.close();
                true
            }
            None => false,
        }
    }

    /// Collect the subscribers whose filter is empty or equals `event_type`.
    ///
    /// The snapshot gives dispatch a consistent view relative to concurrent
    /// add/remove without holding the lock while enqueueing.
    pub(crate) fn snapshot_matching(
        &self,
        event_type: &str,
    ) -> Vec<(String, Arc<EventQueue>, OverflowPolicy)> {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.event_type.is_empty() || entry.event_type == event_type)
            .map(|(id, entry)| (id.clone(), entry.queue.clone(), entry.policy))
            .collect()
    }

    /// Flip the closed flag and drain every subscription, delivering `error`
    /// (if any) to each error channel before closing its queue.
    ///
    /// Returns true for the single caller that performed the teardown; later
    /// callers see false and do nothing.
    pub(crate) fn shutdown(&self, error: Option<FeedError>) -> bool {
        let drained: Vec<SubscriberEntry> = {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.subscriptions.drain().map(|(_, entry)| entry).collect()
        };

        for entry in drained {
            if let Some(err) = &error {
                // Capacity 1 and errors are terminal, so a full channel only
                // means an error is already pending.
                let _ = entry.error_tx.try_send(err.clone());
            }
            entry.queue.close();
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }
}
