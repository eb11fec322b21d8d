//! Error types for the arena server.

use crate::transaction::ProtocolError;
use shared::FramingError;
use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that end a connection or the server itself.
///
/// Handshake rejections are not errors; they are answered in `handshake_ack`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt frame or closed stream.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// The peer's first frame was not a usable handshake.
    #[error("invalid handshake: {0}")]
    Handshake(String),

    /// A frame that cannot be routed to any transaction.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Settings the server cannot run with.
    #[error("invalid configuration: {0}")]
    Config(String),
}
