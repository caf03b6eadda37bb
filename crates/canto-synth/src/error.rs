//! Error types for canto-synth.

use thiserror::Error;

/// Result type alias for canto-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (bank description files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bank description is inconsistent.
    #[error("Invalid bank configuration: {0}")]
    InvalidConfig(String),

    /// Asset loader could not provide a buffer or effect.
    #[error("Failed to load '{name}': {reason}")]
    AssetLoad { name: String, reason: String },

    /// Mixer rejected a request.
    #[error("Mixer error: {0}")]
    Mixer(String),

    #[error("Cannot construct channel {channel}: {reason}")]
    ChannelConstruction { channel: u16, reason: String },

    #[error("Invalid channel: {0} (must be 0-15)")]
    InvalidChannel(u16),
}
