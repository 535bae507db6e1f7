//! Error types for a3s-emitter

use thiserror::Error;

/// Errors that can occur while building or publishing an emission
#[derive(Debug, Error)]
pub enum EmitterError {
    /// A value could not be represented in the binary envelope format
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Envelope bytes could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Publish failure on the bus
    #[error("Failed to publish to channel '{channel}': {reason}")]
    Transport {
        channel: String,
        reason: String,
    },

    /// Bus connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Publish aborted by the caller's cancellation token
    #[error("Publish to channel '{channel}' was cancelled")]
    Cancelled { channel: String },

    /// Emitter or publisher used after close
    #[error("Publisher is closed")]
    Closed,
}

impl From<rmp_serde::encode::Error> for EmitterError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        EmitterError::Encoding(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for EmitterError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        EmitterError::Decoding(e.to_string())
    }
}

impl EmitterError {
    /// Whether this error came from the bus rather than from envelope construction
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EmitterError::Transport { .. }
                | EmitterError::Cancelled { .. }
                | EmitterError::Closed
                | EmitterError::Connection(_)
        )
    }
}

/// Result type alias for emitter operations
pub type Result<T> = std::result::Result<T, EmitterError>;
