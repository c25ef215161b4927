//! Fan-out of ingress events to live push-channel subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Frames a slow subscriber may have in flight before new ones are dropped
pub const SUBSCRIBER_QUEUE: usize = 256;

type Registry = Arc<RwLock<HashMap<Uuid, mpsc::Sender<String>>>>;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped: usize,
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Registry,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.subscribers.write().insert(id, tx);
        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver one frame to every open subscriber. Closed or saturated
    /// subscribers are skipped; nothing is queued for later.
    pub fn broadcast(&self, frame: &str) -> BroadcastReport {
        // snapshot so subscribers can come and go mid-broadcast
        let targets: Vec<(Uuid, mpsc::Sender<String>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, tx) in targets {
            match tx.try_send(frame.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, "subscriber lagging, frame dropped");
                    report.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => report.skipped += 1,
            }
        }
        report
    }
}

/// Receiving side of one subscriber
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<String>,
    registry: Registry,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.write().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        let report = broadcaster.broadcast("hello");

        assert_eq!(report, BroadcastReport { delivered: 2, skipped: 0 });
        assert_eq!(a.try_recv().as_deref(), Some("hello"));
        assert_eq!(b.try_recv().as_deref(), Some("hello"));
    }

    #[test]
    fn test_no_subscribers() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.broadcast("x"), BroadcastReport::default());
    }

    #[test]
    fn test_dropped_subscription_unregisters() {
        let broadcaster = Broadcaster::new();
        let kept = broadcaster.subscribe();
        let gone = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(gone);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.broadcast("x").delivered, 1);
        drop(kept);
    }

    #[test]
    fn test_saturated_subscriber_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let _slow = broadcaster.subscribe();
        for _ in 0..SUBSCRIBER_QUEUE {
            broadcaster.broadcast("fill");
        }

        let mut fresh = broadcaster.subscribe();
        let report = broadcaster.broadcast("after");

        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 1 });
        assert_eq!(fresh.try_recv().as_deref(), Some("after"));
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let broadcaster = Broadcaster::new();
        broadcaster.broadcast("early");

        let mut late = broadcaster.subscribe();
        assert_eq!(late.try_recv(), None);
    }
}
