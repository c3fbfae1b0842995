//! Connection registry — the set of live peer connections and the
//! broadcaster that fans entries out to them.
//!
//! Locking discipline: `register`/`deregister` take the write lock;
//! `snapshot`/`broadcast` take the read lock only long enough to clone
//! the current handles. No lock is held while sending.
//!
//! The registry never owns sockets. Each entry is the outbound queue of
//! a connection task, which alone closes the socket and deregisters.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ipc::protocol::Entry;
use crate::multiplexer::EntrySink;

/// Unique identifier for a peer connection.
///
/// Monotonically increasing counter; registry removal is by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered connection as seen by the broadcaster.
#[derive(Debug, Clone)]
pub struct RegisteredConnection {
    pub id: ConnectionId,
    pub outbound: mpsc::Sender<Entry>,
}

/// Ordered set of live connections, unique per [`ConnectionId`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<Vec<RegisteredConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection. Returns `false` (and changes nothing) if the
    /// id is already registered.
    pub async fn register(&self, id: ConnectionId, outbound: mpsc::Sender<Entry>) -> bool {
        let mut connections = self.connections.write().await;
        if connections.iter().any(|c| c.id == id) {
            return false;
        }
        connections.push(RegisteredConnection { id, outbound });
        true
    }

    /// Remove the connection with `id`, keeping the order of the rest.
    /// Returns `false` if it was not registered.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        match connections.iter().position(|c| c.id == id) {
            Some(index) => {
                connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the registered connections.
    pub async fn snapshot(&self) -> Vec<RegisteredConnection> {
        self.connections.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Offer `entry` to every connection in a snapshot taken now.
    ///
    /// A connection whose queue is full or closed misses this entry but
    /// stays registered; its own task deregisters it when it ends.
    /// Returns the number of connections the entry was queued for.
    pub async fn broadcast(&self, entry: &Entry) -> usize {
        let recipients = self.snapshot().await;
        let mut delivered = 0;

        for conn in &recipients {
            match conn.outbound.try_send(entry.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn_id = ?conn.id, format = %entry.format, "peer queue full, dropping update");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(conn_id = ?conn.id, "peer closing, update not queued");
                }
            }
        }

        tracing::debug!(
            format = %entry.format,
            bytes = entry.data.len(),
            delivered,
            recipients = recipients.len(),
            "broadcast"
        );
        delivered
    }
}

impl EntrySink for ConnectionRegistry {
    async fn deliver(&self, entry: Entry) {
        self.broadcast(&entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::Format;

    fn queue() -> (mpsc::Sender<Entry>, mpsc::Receiver<Entry>) {
        mpsc::channel(4)
    }

    fn ids(snapshot: &[RegisteredConnection]) -> Vec<ConnectionId> {
        snapshot.iter().map(|c| c.id).collect()
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn register_then_deregister_leaves_no_trace() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = queue();

        assert!(registry.register(id, tx).await);
        assert_eq!(ids(&registry.snapshot().await), vec![id]);

        assert!(registry.deregister(id).await);
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn double_register_keeps_one_entry() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = queue();

        assert!(registry.register(id, tx.clone()).await);
        assert!(!registry.register(id, tx).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn deregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = queue();
        let id = ConnectionId::new();
        registry.register(id, tx).await;

        assert!(!registry.deregister(ConnectionId::new()).await);
        assert_eq!(ids(&registry.snapshot().await), vec![id]);

        assert!(registry.deregister(id).await);
        assert!(!registry.deregister(id).await, "second deregister is a no-op");
    }

    #[tokio::test]
    async fn removal_preserves_order() {
        let registry = ConnectionRegistry::new();
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        let (tx, _rx) = queue();
        registry.register(a, tx.clone()).await;
        registry.register(b, tx.clone()).await;
        registry.register(c, tx).await;

        registry.deregister(b).await;
        assert_eq!(ids(&registry.snapshot().await), vec![a, c]);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_connection() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = queue();
        let (tx2, mut rx2) = queue();
        registry.register(ConnectionId::new(), tx1).await;
        registry.register(ConnectionId::new(), tx2).await;

        let entry = Entry::new(Format::Text, b"hello".to_vec());
        assert_eq!(registry.broadcast(&entry).await, 2);
        assert_eq!(rx1.recv().await.unwrap(), entry);
        assert_eq!(rx2.recv().await.unwrap(), entry);
    }

    #[tokio::test]
    async fn late_registration_misses_earlier_broadcast() {
        let registry = ConnectionRegistry::new();
        let (early_tx, mut early_rx) = queue();
        registry.register(ConnectionId::new(), early_tx).await;

        let entry = Entry::new(Format::Text, b"first".to_vec());
        registry.broadcast(&entry).await;

        let (late_tx, mut late_rx) = queue();
        registry.register(ConnectionId::new(), late_tx).await;

        assert_eq!(early_rx.recv().await.unwrap(), entry);
        assert!(late_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deregistered_connection_receives_nothing() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, mut rx) = queue();
        registry.register(id, tx).await;
        registry.deregister(id).await;

        let delivered = registry.broadcast(&Entry::new(Format::Image, vec![1])).await;
        assert_eq!(delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_sends_do_not_deregister() {
        let registry = ConnectionRegistry::new();

        let full_id = ConnectionId::new();
        let (full_tx, _full_rx) = mpsc::channel(1);
        full_tx.try_send(Entry::new(Format::Text, b"queued".to_vec())).unwrap();
        registry.register(full_id, full_tx).await;

        let closed_id = ConnectionId::new();
        let (closed_tx, closed_rx) = queue();
        drop(closed_rx);
        registry.register(closed_id, closed_tx).await;

        let delivered = registry.broadcast(&Entry::new(Format::Text, b"x".to_vec())).await;
        assert_eq!(delivered, 0);
        assert_eq!(ids(&registry.snapshot().await), vec![full_id, closed_id]);
    }

    #[tokio::test]
    async fn deliver_broadcasts() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = queue();
        registry.register(ConnectionId::new(), tx).await;

        let entry = Entry::new(Format::Image, vec![0x89, b'P', b'N', b'G']);
        registry.deliver(entry.clone()).await;
        assert_eq!(rx.recv().await.unwrap(), entry);
    }
}
