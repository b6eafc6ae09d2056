//! Message envelope and classification
//!
//! An [`Envelope`] is a validated top-level JSON object. The relay never
//! forwards raw bytes: inbound frames are parsed into an envelope, enriched
//! with server metadata (`sender`, `timestamp`), and re-serialized for
//! broadcast. Fields the relay does not recognize pass through untouched.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::time::Timestamp;
use crate::SERVER_SENDER;

/// Classified message shape.
///
/// Classification is driven by the `(type, action)` pair. It only affects
/// what the relay logs about a message, never whether the message is
/// broadcast. Anything that does not match a recognized shape lands in
/// [`MessageKind::Standard`] (chat, status, free-form).
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// Handshake message; consumed by the relay, never rebroadcast
    Identification,
    /// Movement command (`type=action`, `action=GOTO`) with `data.x/y/z`
    Goto { target: Option<Position> },
    /// Look query result (`type=action_response`, `action=look`/`look_manual`)
    LookReport { manual: bool },
    /// Door descriptor update carrying a `doors` array
    DoorLocations { count: usize },
    /// Server-style system notice (clients may send these as chat)
    System,
    /// Error report
    ErrorReport,
    /// Everything else: chat, status, unknown types
    Standard,
}

/// A world position extracted from a movement command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X:{} Y:{} Z:{}", self.x, self.y, self.z)
    }
}

/// A parsed top-level JSON object flowing through the relay
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    body: Map<String, Value>,
}

impl Envelope {
    /// Parse an inbound text frame.
    ///
    /// The frame must be well-formed JSON with an object at the top level;
    /// anything else is a malformed payload.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::MalformedPayload(e.to_string()))?;
        match value {
            Value::Object(body) => Ok(Self { body }),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Build a relay-originated `system` message
    pub fn system(content: impl Into<String>) -> Self {
        Self::server_message("system", content)
    }

    /// Build a relay-originated `error` message
    pub fn error_report(content: impl Into<String>) -> Self {
        Self::server_message("error", content)
    }

    fn server_message(message_type: &str, content: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("type".into(), Value::String(message_type.into()));
        body.insert("sender".into(), Value::String(SERVER_SENDER.into()));
        body.insert("content".into(), Value::String(content.into()));
        Self { body }
    }

    /// The `type` discriminator, if present and a string
    pub fn message_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// The `action` qualifier, if present and a string
    pub fn action(&self) -> Option<&str> {
        self.str_field("action")
    }

    /// The declared `sender`, if present and a non-empty string
    pub fn sender(&self) -> Option<&str> {
        self.str_field("sender").filter(|s| !s.is_empty())
    }

    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    pub fn looking_at(&self) -> Option<&str> {
        self.str_field("looking_at")
    }

    /// The server-assigned `timestamp`, once stamped
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.body.get("timestamp").and_then(Value::as_u64)
    }

    /// Raw field access (primarily for tests and diagnostics)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Fill in `sender` with the connection identity when the client did
    /// not declare one (or declared an empty string).
    pub fn ensure_sender(&mut self, fallback: &str) {
        if self.sender().is_none() {
            self.body
                .insert("sender".into(), Value::String(fallback.into()));
        }
    }

    /// Assign the server-side receipt timestamp
    pub fn stamp(&mut self, timestamp: Timestamp) {
        self.body
            .insert("timestamp".into(), Value::Number(timestamp.into()));
    }

    /// Classify by the `(type, action)` pair
    pub fn kind(&self) -> MessageKind {
        match self.message_type() {
            Some("identification") => MessageKind::Identification,
            Some("action") if self.action() == Some("GOTO") => MessageKind::Goto {
                target: self.goto_target(),
            },
            Some("action_response") => match self.action() {
                Some("look") => MessageKind::LookReport { manual: false },
                Some("look_manual") => MessageKind::LookReport { manual: true },
                _ => MessageKind::Standard,
            },
            Some("doorLocations") => MessageKind::DoorLocations {
                count: self.door_count(),
            },
            Some("system") => MessageKind::System,
            Some("error") => MessageKind::ErrorReport,
            _ => MessageKind::Standard,
        }
    }

    /// Re-serialize for the wire
    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(&self.body).map_err(|e| Error::Encode(e.to_string()))
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    fn goto_target(&self) -> Option<Position> {
        let data = self.body.get("data")?;
        Some(Position {
            x: data.get("x")?.as_f64()?,
            y: data.get("y")?.as_f64()?,
            z: data.get("z")?.as_f64()?,
        })
    }

    fn door_count(&self) -> usize {
        self.body
            .get("doors")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}
