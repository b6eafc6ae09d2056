//! Relay error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] beacon_transport::TransportError),

    #[error("core protocol error: {0}")]
    Core(#[from] beacon_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
