//! Beacon Core
//!
//! Core protocol primitives for the Beacon relay:
//! - Message envelope and classification ([`Envelope`], [`MessageKind`])
//! - Server timestamps ([`Clock`], [`Timestamp`])
//! - Error types ([`Error`])
//!
//! The relay is schema-permissive: an envelope is any JSON object with an
//! optional `type` discriminator. Unrecognized types fall into the standard
//! broadcast bucket rather than being rejected.

pub mod envelope;
pub mod error;
pub mod time;

pub use envelope::{Envelope, MessageKind, Position};
pub use error::{Error, Result};
pub use time::{Clock, Timestamp};

/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 8080;

/// Sender attributed to relay-originated messages
pub const SERVER_SENDER: &str = "server";
