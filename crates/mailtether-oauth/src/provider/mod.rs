//! Authorization server presets.

use url::Url;

use crate::error::{Error, Result};

/// IMAP scope for Outlook / Microsoft 365 mailboxes.
pub const OUTLOOK_IMAP_SCOPE: &str = "https://outlook.office.com/IMAP.AccessAsUser.All";

/// Authorization server endpoints and default scopes.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name, for logging.
    pub name: String,
    /// Token endpoint.
    pub token_url: Url,
    /// Device authorization endpoint, if the provider supports RFC 8628.
    pub device_auth_url: Option<Url>,
    /// Scopes requested when the caller does not specify any.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a provider from its token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(name: impl Into<String>, token_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            token_url: Url::parse(token_url.as_ref())?,
            device_auth_url: None,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the device authorization endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_device_auth_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.device_auth_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Google, full Gmail access over IMAP.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new("Google", "https://oauth2.googleapis.com/token")?
            .with_device_auth_url("https://oauth2.googleapis.com/device/code")?
            .with_default_scopes(["https://mail.google.com/"]))
    }

    /// Microsoft identity platform, `common` tenant (work, school and
    /// personal accounts).
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Self::microsoft_tenant("Microsoft", "common")
    }

    /// Microsoft identity platform restricted to personal accounts
    /// (outlook.com, hotmail.com, live.com).
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft_consumers() -> Result<Self> {
        Self::microsoft_tenant("Microsoft (consumers)", "consumers")
    }

    fn microsoft_tenant(name: &str, tenant: &str) -> Result<Self> {
        let authority = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0");
        Ok(Self::new(name, format!("{authority}/token"))?
            .with_device_auth_url(format!("{authority}/devicecode"))?
            .with_default_scopes([OUTLOOK_IMAP_SCOPE, "offline_access"]))
    }

    /// Returns the device authorization endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the provider has none.
    pub fn device_auth_url(&self) -> Result<&Url> {
        self.device_auth_url.as_ref().ok_or_else(|| {
            Error::InvalidConfig(format!("provider {} does not support device flow", self.name))
        })
    }
}
