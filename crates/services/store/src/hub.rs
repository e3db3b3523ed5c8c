//! Live subscriber registry and broadcast
//!
//! Each subscriber gets a bounded queue; the WebSocket task on the other end
//! drains it into its socket. `broadcast` serializes the payload once, takes a
//! snapshot of the registry, and offers the payload to every queue in the
//! snapshot concurrently, waiting at most `send_timeout` per subscriber.
//! Subscribers whose queue is closed or stays full past the timeout are
//! dropped from the registry before `broadcast` returns.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Registry key of one subscriber; never reused
pub type ObserverId = u64;

/// Hub tuning
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Longest a broadcast waits on one subscriber's queue
    pub send_timeout: Duration,

    /// Payloads buffered per subscriber
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(2),
            queue_capacity: 64,
        }
    }
}

/// Receiving end of one subscription
pub struct ObserverHandle {
    id: ObserverId,
    rx: mpsc::Receiver<Arc<str>>,
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next broadcast payload; `None` once the hub has dropped this subscriber
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the payload was queued for
    pub delivered: usize,

    /// Subscribers removed because delivery failed
    pub pruned: usize,
}

/// Registry of live subscribers
pub struct SubscriptionHub {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl SubscriptionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));

        let count = {
            let mut observers = self.observers.lock();
            observers.insert(id, tx);
            observers.len()
        };

        tracing::info!(observer_id = id, observers = count, "Subscriber connected");
        ObserverHandle { id, rx }
    }

    /// Remove a subscriber; `false` if it was already gone
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.observers.lock().remove(&id).is_some();
        if removed {
            tracing::info!(observer_id = id, "Subscriber disconnected");
        }
        removed
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `message` as JSON to every subscriber registered right now
    pub async fn broadcast<T>(&self, message: &T) -> Result<BroadcastReport, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let payload: Arc<str> = serde_json::to_string(message)?.into();

        let snapshot: Vec<(ObserverId, mpsc::Sender<Arc<str>>)> = self
            .observers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        if snapshot.is_empty() {
            return Ok(BroadcastReport::default());
        }

        let timeout = self.config.send_timeout;
        let attempts = snapshot.into_iter().map(|(id, tx)| {
            let payload = payload.clone();
            async move { (id, tx.send_timeout(payload, timeout).await) }
        });

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(observer_id = id, error = %e, "Dropping unresponsive subscriber");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut observers = self.observers.lock();
            report.pruned = failed
                .iter()
                .filter(|id| observers.remove(*id).is_some())
                .count();
        }

        tracing::debug!(
            delivered = report.delivered,
            pruned = report.pruned,
            bytes = payload.len(),
            "Broadcast complete"
        );
        Ok(report)
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
