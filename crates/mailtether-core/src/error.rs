//! Error types for the session layer.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while managing sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailtether_imap::Error),

    /// Credential acquisition failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] mailtether_oauth::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has no live connection.
    #[error("Not connected")]
    NotConnected,

    /// A keep-alive cycle for one session did not finish in time.
    #[error("Keep-alive timed out after {0:?}")]
    Timeout(Duration),

    /// Reconnection was attempted and failed; holds the connector's error.
    #[error("Reconnect failed: {0}")]
    Reconnect(#[source] Arc<Error>),

    /// A connect was cancelled by a newer one on the same transport.
    #[error("Connect superseded by a newer attempt")]
    Superseded,

    /// A connector or listener panicked.
    #[error("Panicked: {0}")]
    Panicked(String),

    /// The transport does not support the requested authentication method.
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuthMethod(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Renders a panic payload caught by `catch_unwind` or a failed join.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
