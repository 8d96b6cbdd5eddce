use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use roster_types::events::Notification;

/// Tracks the set of live notification listeners and fans event messages out
/// to all of them.
///
/// One instance is constructed at process start and handed by clone to every
/// request handler that mutates users and to every WebSocket connection task.
/// Registration is keyed by connection id, so a handle registered twice is
/// still delivered to exactly once. Removal happens only through
/// `unregister`, driven by the connection task observing transport closure —
/// `broadcast` skips dead senders but never prunes them.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    /// Live connections: conn_id -> per-connection send queue.
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<Notification>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a connection to the live set. Re-registering an already-known
    /// `conn_id` replaces its queue rather than adding a second entry.
    pub async fn register(&self, conn_id: Uuid, tx: mpsc::UnboundedSender<Notification>) {
        self.inner.connections.write().await.insert(conn_id, tx);
    }

    /// Remove a connection from the live set; no-op if it was never
    /// registered or is already gone.
    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Deliver `message` to every connection currently in the live set.
    ///
    /// Delivery is fire-and-forget into each connection's queue: a closed or
    /// failing connection is skipped and never stops fan-out to the rest.
    /// The actual socket write happens on the connection's own task, so a
    /// slow client cannot stall this call.
    pub async fn broadcast(&self, message: impl Into<String>) {
        let notification = Notification::new(message);

        let connections = self.inner.connections.read().await;
        for (conn_id, tx) in connections.iter() {
            if tx.is_closed() {
                debug!("skipping closed connection {}", conn_id);
                continue;
            }
            if tx.send(notification.clone()).is_err() {
                debug!("dropping notification for connection {}", conn_id);
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn listener() -> (
        Uuid,
        mpsc::UnboundedSender<Notification>,
        mpsc::UnboundedReceiver<Notification>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_registered_listener() {
        let notifier = Notifier::new();
        let (id, tx, mut rx) = listener();

        notifier.register(id, tx).await;
        notifier.broadcast("User 1 created").await;

        assert_eq!(rx.recv().await.unwrap(), Notification::new("User 1 created"));
    }

    #[tokio::test]
    async fn unregistered_listener_receives_nothing() {
        let notifier = Notifier::new();
        let (id, tx, mut rx) = listener();

        notifier.register(id, tx).await;
        notifier.unregister(id).await;
        notifier.broadcast("hello").await;

        // Unregistering dropped the sender, so the channel reports closed —
        // either way, no notification was delivered.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_unknown_connection_is_noop() {
        let notifier = Notifier::new();
        notifier.unregister(Uuid::new_v4()).await;
        assert_eq!(notifier.connection_count().await, 0);
    }

    #[tokio::test]
    async fn double_registration_delivers_once() {
        let notifier = Notifier::new();
        let (id, tx, mut rx) = listener();

        notifier.register(id, tx.clone()).await;
        notifier.register(id, tx).await;
        notifier.broadcast("once").await;

        assert_eq!(rx.try_recv().unwrap(), Notification::new("once"));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn dead_listener_does_not_block_the_rest() {
        let notifier = Notifier::new();
        let (id_dead, tx_dead, rx_dead) = listener();
        let (id_live, tx_live, mut rx_live) = listener();

        notifier.register(id_dead, tx_dead).await;
        notifier.register(id_live, tx_live).await;
        drop(rx_dead);

        notifier.broadcast("still delivered").await;

        assert_eq!(
            rx_live.try_recv().unwrap(),
            Notification::new("still delivered")
        );
    }

    #[tokio::test]
    async fn broadcast_skips_but_never_prunes_dead_listeners() {
        let notifier = Notifier::new();
        let (id, tx, rx) = listener();

        notifier.register(id, tx).await;
        drop(rx);
        notifier.broadcast("into the void").await;

        // Removal is unregister's job, triggered by the transport.
        assert_eq!(notifier.connection_count().await, 1);
        notifier.unregister(id).await;
        assert_eq!(notifier.connection_count().await, 0);
    }

    #[tokio::test]
    async fn three_listeners_one_unregistered() {
        let notifier = Notifier::new();
        let (id_a, tx_a, mut rx_a) = listener();
        let (id_b, tx_b, mut rx_b) = listener();
        let (id_c, tx_c, mut rx_c) = listener();

        notifier.register(id_a, tx_a).await;
        notifier.register(id_b, tx_b).await;
        notifier.register(id_c, tx_c).await;
        notifier.unregister(id_b).await;

        notifier.broadcast("hello").await;

        assert_eq!(rx_a.try_recv().unwrap(), Notification::new("hello"));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(rx_c.try_recv().unwrap(), Notification::new("hello"));
    }

    #[tokio::test]
    async fn broadcast_with_no_listeners_completes() {
        let notifier = Notifier::new();
        notifier.broadcast("nobody home").await;
        assert_eq!(notifier.connection_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_broadcasts_and_registrations() {
        let notifier = Notifier::new();
        let (id, tx, mut rx) = listener();
        notifier.register(id, tx).await;

        let n1 = notifier.clone();
        let n2 = notifier.clone();
        let broadcasts = tokio::spawn(async move {
            for i in 0..100 {
                n1.broadcast(format!("event {}", i)).await;
            }
        });
        let churn = tokio::spawn(async move {
            for _ in 0..100 {
                let (other_id, other_tx, _rx) = {
                    let (tx, rx) = mpsc::unbounded_channel();
                    (Uuid::new_v4(), tx, rx)
                };
                n2.register(other_id, other_tx).await;
                n2.unregister(other_id).await;
            }
        });

        broadcasts.await.unwrap();
        churn.await.unwrap();

        // The listener registered before any broadcast saw every event.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 100);
        assert_eq!(notifier.connection_count().await, 1);
    }
}
