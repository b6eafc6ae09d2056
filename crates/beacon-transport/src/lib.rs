//! Beacon Transport Layer
//!
//! Transport implementations for the Beacon relay. The relay speaks
//! newline-free JSON text frames; the transport layer delivers each frame
//! as a `String` together with connection lifecycle events.
//!
//! - WebSocket (primary, required)

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer, WebSocketTransport,
};
