//! Error types for credential operations.

use std::io;

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while obtaining, refreshing or persisting tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (token file access).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error returned by the authorization server.
    #[error("OAuth2 error: {error} - {description}")]
    OAuth {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// Device code or token expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token has no refresh token.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Malformed token endpoint response.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Device authorization was not completed in time.
    #[error("Authorization timed out after {0} seconds")]
    Timeout(u64),

    /// User denied authorization.
    #[error("User denied authorization")]
    AccessDenied,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// No token has been persisted for the account; run the device login.
    #[error("No account logged in")]
    NotLoggedIn,

    /// System keyring failure.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Token encryption or decryption failure.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl Error {
    /// Creates an OAuth error from error code and description.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns the server error code for [`Error::OAuth`].
    #[must_use]
    pub fn oauth_code(&self) -> Option<&str> {
        match self {
            Self::OAuth { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_error_message_contains_code() {
        let err = Error::oauth_error("invalid_grant", "AADSTS70000: refresh token revoked");
        assert!(err.to_string().contains("invalid_grant"));
        assert_eq!(err.oauth_code(), Some("invalid_grant"));
        assert_eq!(Error::NotLoggedIn.oauth_code(), None);
    }
}
