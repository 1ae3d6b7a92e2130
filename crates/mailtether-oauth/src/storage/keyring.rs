//! System keyring token storage.
//!
//! Uses the platform's native credential store:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

use super::TokenStorage;
use crate::Result;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailtether";

/// Stores the token in a keyring entry named after the username.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    username: String,
}

impl KeyringTokenStorage {
    /// Storage for `username`.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Ok(Entry::new(SERVICE_NAME, &format!("oauth_token_{}", self.username))?)
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn store(&self, token: &str) -> Result<()> {
        self.entry()?.set_password(token)?;
        debug!(username = %self.username, "stored token in keyring");
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => {
                debug!(username = %self.username, "no token in keyring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
