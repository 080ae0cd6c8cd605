//! Error types for uart-link.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration value out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Application payload does not fit in the data field.
    #[error("Payload of {len} bytes exceeds maximum {max}")]
    OversizedPayload { len: usize, max: usize },

    /// Received packet failed its integrity check.
    ///
    /// Absorbed by the link controller, which answers with a RETX request.
    #[error("CRC mismatch: computed 0x{computed:02x}, received 0x{received:02x}")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// Too many consecutive corrupted packets; the channel is unusable.
    #[error("Persistent corruption: {failures} consecutive CRC failures")]
    PersistentCorruption { failures: u32 },

    /// Link session ended (writer, command channel or queue closed).
    #[error("Connection closed")]
    ConnectionClosed,

    /// No packet arrived within the requested time.
    #[error("Timed out after {0:?} waiting for a packet")]
    RecvTimeout(Duration),

    /// A link or writer task panicked or was cancelled.
    #[error("Link task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
