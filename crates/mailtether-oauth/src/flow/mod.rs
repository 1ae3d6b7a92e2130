//! Token endpoint client and the device authorization flow.

mod device;

pub use device::{DeviceAuthorization, DeviceFlow};

use std::collections::HashMap;

use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};

/// Public or confidential `OAuth2` client registration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from the provider's app registration.
    pub client_id: String,
    /// Client secret (public clients have none).
    pub client_secret: Option<String>,
    /// Provider endpoints.
    pub provider: Provider,
    http_client: Client,
}

impl OAuthClient {
    /// Creates a public client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Exchanges the refresh token of `token` for a new access token.
    ///
    /// The returned token keeps the old refresh token when the server does
    /// not rotate it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NoRefreshToken`] if `token` has none, or the
    /// server's error (e.g. `invalid_grant` for a revoked refresh token).
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);
        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }
        let scope = self.provider.default_scopes.join(" ");
        if !scope.is_empty() {
            params.insert("scope", &scope);
        }

        debug!(provider = %self.provider.name, "refreshing access token");
        let mut new_token = self.post_token_request(&params).await?;
        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }
        Ok(new_token)
    }

    /// POSTs a form to the token endpoint and decodes the token or error body.
    pub(crate) async fn post_token_request(&self, params: &HashMap<&str, &str>) -> Result<Token> {
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(Token::from_response(token_response))
    }
}
