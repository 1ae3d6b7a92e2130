//! Device Authorization Grant (RFC 8628).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::OAuthClient;
use crate::error::{Error, Result};
use crate::token::{ErrorResponse, Token};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// RFC 8628 section 3.5: add five seconds on `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Device authorization response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceAuthorization {
    /// Device code used while polling.
    pub device_code: String,
    /// Code the user types at the verification URI.
    pub user_code: String,
    /// Where the user completes the login.
    pub verification_uri: String,
    /// Verification URI with the user code embedded, if offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    /// Lifetime of the device code in seconds.
    pub expires_in: u32,
    /// Minimum polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Provider-formatted instructions, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

const fn default_interval() -> u32 {
    5
}

/// Device flow driver for a client.
#[derive(Debug)]
pub struct DeviceFlow<'a> {
    client: &'a OAuthClient,
}

impl<'a> DeviceFlow<'a> {
    /// Creates a device flow for `client`.
    #[must_use]
    pub const fn new(client: &'a OAuthClient) -> Self {
        Self { client }
    }

    /// Requests a device and user code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the provider has no device
    /// endpoint, or the server's error.
    pub async fn request_device_authorization(
        &self,
        scopes: Option<&[String]>,
    ) -> Result<DeviceAuthorization> {
        let url = self.client.provider.device_auth_url()?;
        let scope = scopes.map_or_else(
            || self.client.provider.default_scopes.join(" "),
            |s| s.join(" "),
        );

        let mut params = HashMap::new();
        params.insert("client_id", self.client.client_id.as_str());
        if !scope.is_empty() {
            params.insert("scope", &scope);
        }

        let response = self
            .client
            .http_client
            .post(url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let auth: DeviceAuthorization = response.json().await?;
        debug!(
            verification_uri = %auth.verification_uri,
            expires_in = auth.expires_in,
            "device authorization issued"
        );
        Ok(auth)
    }

    /// Waits `interval`, then asks the token endpoint once.
    ///
    /// `authorization_pending` and `slow_down` come back as [`Error::OAuth`]
    /// with that code; callers keep polling on those.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccessDenied`] if the user declined,
    /// [`Error::TokenExpired`] if the device code expired, or the server's
    /// error.
    pub async fn poll_for_token(&self, device_code: &str, interval: Duration) -> Result<Token> {
        tokio::time::sleep(interval).await;

        let mut params = HashMap::new();
        params.insert("grant_type", DEVICE_CODE_GRANT);
        params.insert("device_code", device_code);
        params.insert("client_id", &self.client.client_id);

        match self.client.post_token_request(&params).await {
            Err(Error::OAuth { error, .. }) if error == "access_denied" => Err(Error::AccessDenied),
            Err(Error::OAuth { error, .. }) if error == "expired_token" => Err(Error::TokenExpired),
            other => other,
        }
    }

    /// Polls until the user completes the login or the device code expires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] once `expires_in` has elapsed, or any
    /// terminal polling error.
    pub async fn wait_for_token(&self, auth: &DeviceAuthorization) -> Result<Token> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(auth.expires_in));
        let mut interval = Duration::from_secs(u64::from(auth.interval));

        loop {
            if Instant::now() + interval > deadline {
                return Err(Error::Timeout(auth.expires_in.into()));
            }
            match self.poll_for_token(&auth.device_code, interval).await {
                Ok(token) => {
                    info!(provider = %self.client.provider.name, "device login completed");
                    return Ok(token);
                }
                Err(Error::OAuth { ref error, .. }) if error == "authorization_pending" => {}
                Err(Error::OAuth { ref error, .. }) if error == "slow_down" => {
                    interval += SLOW_DOWN_STEP;
                    debug!(?interval, "token endpoint asked to slow down");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Requests authorization, hands it to `on_prompt` for display, then
    /// waits for the token.
    ///
    /// # Errors
    ///
    /// See [`DeviceFlow::request_device_authorization`] and
    /// [`DeviceFlow::wait_for_token`].
    pub async fn authorize<F>(&self, scopes: Option<&[String]>, on_prompt: F) -> Result<Token>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let auth = self.request_device_authorization(scopes).await?;
        on_prompt(&auth);
        self.wait_for_token(&auth).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_device_auth_deserialization() {
        let json = r#"{
            "device_code": "dev123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "message": "To sign in, use a web browser..."
        }"#;

        let auth: DeviceAuthorization = serde_json::from_str(json).unwrap();
        assert_eq!(auth.user_code, "ABCD-EFGH");
        assert_eq!(auth.interval, 5);
        assert!(auth.message.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_gives_up_when_code_expires() {
        let client = OAuthClient::new("id", crate::Provider::microsoft().unwrap());
        let flow = DeviceFlow::new(&client);
        let auth = DeviceAuthorization {
            device_code: "dev".into(),
            user_code: "CODE".into(),
            verification_uri: "https://example.com".into(),
            verification_uri_complete: None,
            expires_in: 3,
            interval: 5,
            message: None,
        };
        assert!(matches!(
            flow.wait_for_token(&auth).await,
            Err(Error::Timeout(3))
        ));
    }
}
