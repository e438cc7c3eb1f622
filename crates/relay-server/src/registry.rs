//! Live subscriber set.
//!
//! Each subscriber owns a bounded outbound queue drained by its socket task.
//! Fan-out never waits on a subscriber: a full queue skips that payload, a
//! closed queue removes the subscriber.

use dashmap::DashMap;
use relay_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

pub type SubscriberId = u64;

#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl SubscriberRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add a subscriber and hand back the receiving end of its queue.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(id, tx);
        Metrics::subscribers(self.subscribers.len());
        debug!(subscriber = id, total = self.subscribers.len(), "Subscriber registered");
        (id, rx)
    }

    /// Returns `false` if the subscriber was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            Metrics::subscribers(self.subscribers.len());
            debug!(subscriber = id, total = self.subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Queue `payload` for every live subscriber.
    ///
    /// Returns how many subscribers accepted it.
    pub fn fan_out(&self, payload: Arc<str>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = *entry.key(), "Subscriber queue full, payload skipped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal after iteration; DashMap shards are locked while iterating.
        for id in closed {
            self.remove(id);
        }

        delivered
    }
}
