//! Connection state
//!
//! One [`Connection`] per live transport session. A connection starts with
//! a server-generated placeholder identity (`pending_<N>`) and transitions
//! to the client-declared identity on identification. The transition is
//! one-way for the life of the connection, except that a repeated
//! identification overwrites the identity (explicit policy: last writer
//! wins, no uniqueness check across peers).

use beacon_core::Envelope;
use beacon_transport::TransportSender;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// A connected peer
pub struct Connection {
    /// Registry key; also seeds the placeholder identity
    pub id: ConnectionId,
    /// Placeholder before identification, declared name after
    identity: RwLock<String>,
    /// False until the first well-formed identification message
    identified: AtomicBool,
    /// Transport sender for this peer
    sender: Arc<dyn TransportSender>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, sender: Arc<dyn TransportSender>) -> Self {
        Self {
            id,
            identity: RwLock::new(format!("pending_{}", id)),
            identified: AtomicBool::new(false),
            sender,
        }
    }

    /// Current identity under which traffic is attributed
    pub fn identity(&self) -> String {
        self.identity.read().clone()
    }

    pub fn is_identified(&self) -> bool {
        self.identified.load(Ordering::SeqCst)
    }

    /// Apply the identification handshake: adopt the declared name and
    /// admit this connection's traffic to the broadcast channel.
    pub fn identify(&self, name: &str) {
        *self.identity.write() = name.to_string();
        self.identified.store(true, Ordering::SeqCst);
    }

    /// Whether the transport will still accept sends
    pub fn is_open(&self) -> bool {
        self.sender.is_connected()
    }

    /// Send one envelope to this peer
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        self.send_text(envelope.to_wire()?).await
    }

    /// Send pre-serialized wire text (broadcast path serializes once)
    pub(crate) async fn send_text(&self, text: String) -> Result<()> {
        self.sender.send(text).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &self.identity())
            .field("identified", &self.is_identified())
            .field("open", &self.is_open())
            .finish()
    }
}
