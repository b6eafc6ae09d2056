//! Error types for Beacon

use thiserror::Error;

/// Result type alias for Beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Beacon error types
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound frame is not well-formed JSON
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Inbound frame parsed but is not a top-level object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// Re-serialization of an outbound envelope failed
    #[error("encode error: {0}")]
    Encode(String),
}
