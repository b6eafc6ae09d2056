//! Presence notifications
//!
//! Server-originated `system` messages injected into the same fan-out path
//! as client traffic. Welcome is private to the new connection; joined and
//! left are broadcast. A connection that never identified leaves silently.

use beacon_core::{Clock, Envelope};
use std::sync::Arc;
use tracing::warn;

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

pub struct PresenceNotifier {
    registry: Arc<ConnectionRegistry>,
    clock: Arc<Clock>,
}

impl PresenceNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>, clock: Arc<Clock>) -> Self {
        Self { registry, clock }
    }

    /// Greet a freshly registered connection, inviting identification.
    /// Sent only to that connection, never broadcast.
    pub async fn welcome(&self, connection: &Connection) {
        let mut envelope = Envelope::system(format!(
            "Welcome {}. Identify yourself to join the relay.",
            connection.identity()
        ));
        envelope.stamp(self.clock.tick());
        if let Err(e) = connection.send(&envelope).await {
            warn!("Welcome to {} failed: {}", connection.identity(), e);
        }
    }

    /// Announce a successful identification to every open connection
    pub async fn joined(&self, name: &str) {
        self.announce(format!("{} has connected.", name)).await;
    }

    /// Announce the departure of a previously identified connection
    pub async fn left(&self, name: &str) {
        self.announce(format!("{} has disconnected.", name)).await;
    }

    async fn announce(&self, content: String) {
        let mut envelope = Envelope::system(content);
        envelope.stamp(self.clock.tick());
        self.registry.broadcast(&envelope).await;
    }
}
