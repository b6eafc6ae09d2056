//! Main relay implementation
//!
//! The relay is transport-agnostic: it accepts connections from any
//! [`TransportServer`] and drives each one through the same event path:
//!
//! register -> identification gate -> classify + enrich -> broadcast
//!
//! Every event (connect, message, close, error) is processed to completion,
//! including its full broadcast fan-out, under a relay-wide dispatch guard.
//! A broadcast therefore never observes a connection mid-removal and never
//! misses one registered before the broadcast began.

use beacon_core::{Clock, Envelope, MessageKind};
use beacon_transport::{TransportEvent, TransportReceiver, TransportSender, TransportServer};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[cfg(feature = "websocket")]
use beacon_transport::WebSocketServer;

use crate::connection::Connection;
use crate::error::Result;
use crate::presence::PresenceNotifier;
use crate::registry::ConnectionRegistry;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Server name (logging only)
    pub name: String,
    /// Reply to malformed frames with an `error` message instead of
    /// dropping them silently
    pub reply_on_malformed: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "Beacon Relay".to_string(),
            reply_on_malformed: true,
        }
    }
}

/// The relay engine
pub struct Relay {
    config: RelayConfig,
    registry: Arc<ConnectionRegistry>,
    presence: PresenceNotifier,
    clock: Arc<Clock>,
    /// Serializes event processing with respect to broadcasts
    dispatch: Mutex<()>,
    running: Arc<RwLock<bool>>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let clock = Arc::new(Clock::new());
        Self {
            config,
            presence: PresenceNotifier::new(registry.clone(), clock.clone()),
            registry,
            clock,
            dispatch: Mutex::new(()),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Serve using any TransportServer implementation
    pub async fn serve_on<S>(self: Arc<Self>, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("{} accepting connections", self.config.name);
        *self.running.write() = true;

        while *self.running.read() {
            match server.accept().await {
                Ok((sender, receiver, addr)) => {
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Start the relay on WebSocket
    #[cfg(feature = "websocket")]
    pub async fn serve_websocket(self: Arc<Self>, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        self.serve_on(server).await
    }

    /// Stop accepting new connections
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Drive one accepted connection's event stream
    fn handle_connection(
        self: &Arc<Self>,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            let connection = relay.on_connect(sender).await;
            info!("New client connected: {} ({})", connection.identity(), addr);

            while let Some(event) = receiver.recv().await {
                match event {
                    TransportEvent::Data(text) => {
                        relay.on_message(&connection, &text).await;
                    }
                    TransportEvent::Disconnected { reason } => {
                        debug!("Client {} disconnected: {:?}", connection.identity(), reason);
                        break;
                    }
                    TransportEvent::Error(e) => {
                        relay.on_error(&connection, &e).await;
                        return;
                    }
                    TransportEvent::Connected => {}
                }
            }

            relay.on_close(&connection).await;
        });
    }

    // =========================================================================
    // Event entry points
    //
    // Public so the engine can be driven directly, without a socket. Each
    // takes the dispatch guard for its full duration.
    // =========================================================================

    /// A new transport session: register it and send the private welcome
    pub async fn on_connect(&self, sender: Arc<dyn TransportSender>) -> Arc<Connection> {
        let _guard = self.dispatch.lock().await;
        let connection = self.registry.register(sender);
        self.presence.welcome(&connection).await;
        connection
    }

    /// One inbound text frame from a connection
    pub async fn on_message(&self, connection: &Arc<Connection>, text: &str) {
        let _guard = self.dispatch.lock().await;
        self.process_frame(connection, text).await;
    }

    /// Clean close: remove, and announce the departure of identified peers
    pub async fn on_close(&self, connection: &Connection) {
        let _guard = self.dispatch.lock().await;
        info!("Client disconnected: {}", connection.identity());
        self.unregister(connection).await;
    }

    /// Transport-level error: same removal path as a close
    pub async fn on_error(&self, connection: &Connection, error: &str) {
        let _guard = self.dispatch.lock().await;
        error!("Transport error for {}: {}", connection.identity(), error);
        self.unregister(connection).await;
    }

    async fn unregister(&self, connection: &Connection) {
        // remove() is idempotent; the departure announcement rides on the
        // first successful removal so "left" is emitted at most once
        if self.registry.remove(connection.id).is_some() && connection.is_identified() {
            self.presence.left(&connection.identity()).await;
        }
    }

    async fn process_frame(&self, connection: &Arc<Connection>, text: &str) {
        let mut envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Invalid frame from {}: {}", connection.identity(), e);
                self.reply_malformed(connection, "Invalid message format received.")
                    .await;
                return;
            }
        };

        // Handshake traffic is consumed here, never rebroadcast
        if envelope.kind() == MessageKind::Identification {
            self.handle_identification(connection, &envelope).await;
            return;
        }

        // Admission control: unidentified peers have no broadcast access
        if !connection.is_identified() {
            debug!(
                "Dropping {} frame from unidentified {}",
                envelope.message_type().unwrap_or("untyped"),
                connection.identity()
            );
            return;
        }

        envelope.ensure_sender(&connection.identity());
        envelope.stamp(self.clock.tick());
        self.log_classified(&envelope);
        self.registry.broadcast(&envelope).await;
    }

    async fn handle_identification(&self, connection: &Arc<Connection>, envelope: &Envelope) {
        let Some(name) = envelope.sender().map(str::to_owned) else {
            warn!(
                "Identification without a sender from {}",
                connection.identity()
            );
            self.reply_malformed(connection, "Identification requires a non-empty sender.")
                .await;
            return;
        };

        // Repeat identifications overwrite and re-announce; duplicate names
        // across peers are allowed, last writer wins
        connection.identify(&name);
        info!("Client identified as {}", name);
        self.presence.joined(&name).await;
    }

    async fn reply_malformed(&self, connection: &Connection, content: &str) {
        if !self.config.reply_on_malformed {
            return;
        }
        let mut reply = Envelope::error_report(content);
        reply.stamp(self.clock.tick());
        if let Err(e) = connection.send(&reply).await {
            debug!("Error reply to {} failed: {}", connection.identity(), e);
        }
    }

    /// Diagnostic visibility per recognized shape; never changes routing
    fn log_classified(&self, envelope: &Envelope) {
        let sender = envelope.sender().unwrap_or("unknown");
        match envelope.kind() {
            MessageKind::Goto { target: Some(position) } => {
                info!("GOTO command from {} for {}", sender, position);
            }
            MessageKind::Goto { target: None } => {
                warn!("GOTO command from {} with incomplete coordinates", sender);
            }
            MessageKind::LookReport { manual } => {
                info!(
                    "look{} report from {} (status: {}, target: {})",
                    if manual { "_manual" } else { "" },
                    sender,
                    envelope.status().unwrap_or("-"),
                    envelope.looking_at().unwrap_or("-")
                );
            }
            MessageKind::DoorLocations { count } => {
                info!("doorLocations update from {} ({} doors)", sender, count);
            }
            MessageKind::System | MessageKind::ErrorReport | MessageKind::Standard => {
                debug!(
                    "Broadcasting {} message from {}",
                    envelope.message_type().unwrap_or("untyped"),
                    sender
                );
            }
            // consumed before the broadcast path
            MessageKind::Identification => {}
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
