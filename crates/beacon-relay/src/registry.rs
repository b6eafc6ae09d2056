//! Connection registry
//!
//! The registry is the only shared mutable state in the relay: the set of
//! live connections plus the id counter behind `pending_<N>` placeholders.
//! Broadcast iterates a snapshot of the open set taken at the moment of
//! the broadcast, so register/remove during a fan-out pass never corrupts
//! that pass.

use beacon_core::Envelope;
use beacon_transport::TransportSender;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

use crate::connection::{Connection, ConnectionId};

/// The set of currently live connections
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a new connection with a `pending_<N>` placeholder identity
    pub fn register(&self, sender: Arc<dyn TransportSender>) -> Arc<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(Connection::new(id, sender));
        self.connections.insert(id, connection.clone());
        connection
    }

    /// Remove a connection; idempotent, absent ids are a no-op
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Snapshot of connections whose transport is still open
    pub fn open_connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Fan an envelope out to every open connection, each exactly once.
    ///
    /// A peer closing mid-pass is skipped; an individual send failure is
    /// logged and never fails the pass or affects other peers.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let wire = match envelope.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                error!("Dropping broadcast, envelope failed to serialize: {}", e);
                return;
            }
        };

        for connection in self.open_connections() {
            if !connection.is_open() {
                trace!("Skipping {}, closed mid-broadcast", connection.identity());
                continue;
            }
            if let Err(e) = connection.send_text(wire.clone()).await {
                warn!("Broadcast send to {} failed: {}", connection.identity(), e);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_transport::{Result as TransportResult, TransportError};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    struct StubSender {
        connected: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl StubSender {
        fn open() -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TransportSender for StubSender {
        async fn send(&self, text: String) -> TransportResult<()> {
            if !self.is_connected() {
                return Err(TransportError::NotConnected);
            }
            self.sent.lock().push(text);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn close(&self) -> TransportResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_register_assigns_pending_identities() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(StubSender::open());
        let second = registry.register(StubSender::open());

        assert_eq!(first.identity(), "pending_1");
        assert_eq!(second.identity(), "pending_2");
        assert!(!first.is_identified());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let connection = registry.register(StubSender::open());

        assert!(registry.remove(connection.id).is_some());
        assert!(registry.remove(connection.id).is_none());
        assert!(registry.remove(999).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_open_snapshot_excludes_closed() {
        let registry = ConnectionRegistry::new();
        let open_sender = StubSender::open();
        let closed_sender = StubSender::open();

        registry.register(open_sender);
        registry.register(closed_sender.clone());
        closed_sender.close().await.unwrap();

        let open = registry.open_connections();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].identity(), "pending_1");
    }

    #[tokio::test]
    async fn test_broadcast_survives_send_failure() {
        let registry = ConnectionRegistry::new();
        let healthy = StubSender::open();
        let dying = StubSender::open();

        registry.register(dying.clone());
        registry.register(healthy.clone());

        // Closes after the snapshot filter would have seen it open
        dying.close().await.unwrap();

        registry.broadcast(&Envelope::system("hello")).await;

        assert_eq!(healthy.sent.lock().len(), 1);
        assert!(dying.sent.lock().is_empty());
    }
}
