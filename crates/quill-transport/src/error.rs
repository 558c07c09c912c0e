//! Transport error types.

use thiserror::Error;

/// The configured public key cannot verify signatures.
#[derive(Debug, Error)]
pub enum InvalidKey {
    /// Not 64 hex digits.
    #[error("public key must be a 64 digit hex string")]
    Encoding,

    /// Not a valid Ed25519 point.
    #[error("invalid public key: {0}")]
    Key(#[source] ed25519_dalek::SignatureError),
}

/// Errors setting up or running a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The public key is unusable.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    /// Binding or serving the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bot token cannot be sent as a header.
    #[error("bot token contains characters not allowed in a header")]
    InvalidToken,

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
