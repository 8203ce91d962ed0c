//! Error types for the `fanslink-sdk` crate.

use fanslink_models::{DecodeError, ModelError};

/// Errors surfaced by the client runtime and the message list.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid client configuration (bad CA file, bad hostname, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// The TLS link could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A model-level constraint was violated.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Inbound wire data failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The referenced message thread does not exist.
    #[error("unknown message thread {0}")]
    UnknownThread(u32),

    /// The referenced thread is in a terminal state and cannot accept
    /// further messages.
    #[error("message thread {0} is terminal")]
    ThreadTerminal(u32),

    /// I/O failure on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}
