//! Node registry.
//!
//! Maps a node id to the outbound queue of the worker that owns its
//! connection. Lookups drive point-to-point delivery; snapshots drive
//! barrier-release and broadcast fan-out.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use cohort_wire::Message;

/// Sending side of a per-client outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// Process-wide map of connected nodes.
///
/// At most one entry exists per node id at any moment. An entry is created
/// by the Init service call and removed when its connection tears down.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<i64, OutboundSender>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` with the given worker queue.
    ///
    /// A second Init for an id that is still connected replaces the old
    /// entry; the displaced worker keeps running but can no longer be
    /// addressed.
    pub fn insert(&self, id: i64, sender: OutboundSender) {
        if self.entries.lock().insert(id, sender).is_some() {
            tracing::warn!(id, "replacing existing registry entry");
        }
    }

    /// Look up the outbound queue for `id`.
    pub fn lookup(&self, id: i64) -> Option<OutboundSender> {
        self.entries.lock().get(&id).cloned()
    }

    /// Remove the entry for `id`, but only if it still belongs to `sender`.
    ///
    /// The guard keeps a worker that was displaced by a reused id from
    /// tearing down the replacement's entry.
    pub fn remove(&self, id: i64, sender: &OutboundSender) {
        let mut entries = self.entries.lock();
        if entries
            .get(&id)
            .is_some_and(|current| current.same_channel(sender))
        {
            entries.remove(&id);
        }
    }

    /// Snapshot every `(id, queue)` pair.
    ///
    /// Fan-out iterates the snapshot so the registry lock is not held
    /// across enqueues.
    pub fn snapshot(&self) -> Vec<(i64, OutboundSender)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
