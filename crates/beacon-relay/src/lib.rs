//! Beacon Relay
//!
//! The relay is a single global broadcast channel for game-world events:
//! - Tracks connected peers in a registry
//! - Gates traffic behind an identification handshake
//! - Classifies, enriches, and rebroadcasts messages to every open peer
//! - Announces joins and departures as server-originated system messages
//!
//! # Example
//!
//! ```no_run
//! use beacon_relay::{Relay, RelayConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Arc::new(Relay::new(RelayConfig::default()));
//!     relay.serve_websocket("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod presence;
pub mod registry;
pub mod relay;

pub use connection::{Connection, ConnectionId};
pub use error::{RelayError, Result};
pub use presence::PresenceNotifier;
pub use registry::ConnectionRegistry;
pub use relay::{Relay, RelayConfig};
