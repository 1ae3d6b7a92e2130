//! Credential providers: produce a username and access token for a mail
//! login.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flow::{DeviceAuthorization, DeviceFlow, OAuthClient};
use crate::storage::TokenStorage;
use crate::token::Token;

/// Username and access token for one login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account the token belongs to.
    pub username: String,
    /// Bearer token for XOAUTH2.
    pub access_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// What the user must do to finish a device login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPrompt {
    /// Page to open.
    pub uri: String,
    /// Code to enter there.
    pub code: String,
    /// Seconds until the code expires.
    pub expires_in: u32,
}

impl From<&DeviceAuthorization> for VerificationPrompt {
    fn from(auth: &DeviceAuthorization) -> Self {
        Self {
            uri: auth.verification_uri.clone(),
            code: auth.user_code.clone(),
            expires_in: auth.expires_in,
        }
    }
}

/// Source of credentials for a mail login.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Produces credentials without user interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no credential is available or it cannot be
    /// renewed.
    async fn login(&self) -> Result<Credentials>;

    /// True if [`CredentialProvider::login`] has something to work with.
    async fn has_cached_credential(&self) -> bool;
}

/// `OAuth2` provider backed by a token storage.
#[derive(Debug)]
pub struct OAuthCredentialProvider<S> {
    client: OAuthClient,
    username: String,
    storage: S,
}

impl<S: TokenStorage> OAuthCredentialProvider<S> {
    /// Creates a provider for `username`.
    #[must_use]
    pub fn new(client: OAuthClient, username: impl Into<String>, storage: S) -> Self {
        Self {
            client,
            username: username.into(),
            storage,
        }
    }

    /// Account this provider logs in.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The token storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Interactive login through the device flow. `on_prompt` receives the
    /// page and code to show the user; the call returns once the user has
    /// approved (or the code expired).
    ///
    /// # Errors
    ///
    /// Returns the device flow's error ([`Error::AccessDenied`],
    /// [`Error::Timeout`], ...) or a storage error.
    pub async fn device_login<F>(&self, on_prompt: F) -> Result<Credentials>
    where
        F: FnOnce(&VerificationPrompt),
    {
        let flow = DeviceFlow::new(&self.client);
        let token = flow
            .authorize(None, |auth| on_prompt(&VerificationPrompt::from(auth)))
            .await?;

        self.storage.store(&token.to_json()?)?;
        info!(username = %self.username, "device login complete");
        Ok(self.credentials(&token))
    }

    fn load_token(&self) -> Result<Option<Token>> {
        self.storage
            .load()?
            .map(|json| Token::from_json(&json))
            .transpose()
    }

    fn credentials(&self, token: &Token) -> Credentials {
        Credentials {
            username: self.username.clone(),
            access_token: token.access_token.clone(),
        }
    }
}

#[async_trait]
impl<S: TokenStorage> CredentialProvider for OAuthCredentialProvider<S> {
    async fn login(&self) -> Result<Credentials> {
        let token = self.load_token()?.ok_or(Error::NotLoggedIn)?;
        if !token.is_expired() {
            return Ok(self.credentials(&token));
        }

        debug!(username = %self.username, "access token expired, refreshing");
        let refreshed = self.client.refresh_token(&token).await?;
        self.storage.store(&refreshed.to_json()?)?;
        Ok(self.credentials(&refreshed))
    }

    async fn has_cached_credential(&self) -> bool {
        match self.load_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(username = %self.username, error = %e, "stored token is unusable");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::storage::MemoryTokenStorage;

    fn provider(storage: MemoryTokenStorage) -> OAuthCredentialProvider<MemoryTokenStorage> {
        let client = OAuthClient::new("client", Provider::microsoft_consumers().unwrap());
        OAuthCredentialProvider::new(client, "user@outlook.com", storage)
    }

    #[tokio::test]
    async fn test_login_without_token() {
        let provider = provider(MemoryTokenStorage::new());
        assert!(!provider.has_cached_credential().await);
        assert!(matches!(provider.login().await, Err(Error::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_login_with_fresh_token() {
        let token = Token::new("at-1", "Bearer").with_refresh_token("rt-1");
        let storage = MemoryTokenStorage::with_token(token.to_json().unwrap());
        let provider = provider(storage);

        assert!(provider.has_cached_credential().await);
        let creds = provider.login().await.unwrap();
        assert_eq!(creds.username, "user@outlook.com");
        assert_eq!(creds.access_token, "at-1");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token() {
        let token = Token::new("at-1", "Bearer")
            .with_expires_at(chrono::Utc::now() - chrono::Duration::minutes(5));
        let provider = provider(MemoryTokenStorage::with_token(token.to_json().unwrap()));
        assert!(matches!(provider.login().await, Err(Error::NoRefreshToken)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_not_cached() {
        let provider = provider(MemoryTokenStorage::with_token("not json"));
        assert!(!provider.has_cached_credential().await);
        assert!(matches!(provider.login().await, Err(Error::Json(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials {
            username: "u".into(),
            access_token: "very-secret".into(),
        };
        assert!(!format!("{creds:?}").contains("very-secret"));
    }
}
