//! Runtime settings read from the environment.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mailtether_oauth::storage::DEFAULT_TOKEN_FILE;

/// Azure app registration (client) ID.
pub const CLIENT_ID_ENV: &str = "OAUTH_CLIENT_ID";
/// Mailbox address.
pub const EMAIL_ENV: &str = "OAUTH_EMAIL";
/// Folder to watch, `INBOX` when unset.
pub const FOLDER_ENV: &str = "MAILTETHER_FOLDER";
/// Token file location.
pub const TOKEN_FILE_ENV: &str = "MAILTETHER_TOKEN_FILE";
/// Base64 AES-256 key; tokens are stored encrypted when set.
pub const TOKEN_KEY_ENV: &str = "MAILTETHER_TOKEN_KEY";

const DEFAULT_FOLDER: &str = "INBOX";

/// What the binary needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client_id: String,
    pub email: String,
    pub folder: String,
    pub token_file: PathBuf,
    pub token_key: Option<String>,
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let client_id = get(CLIENT_ID_ENV)
            .with_context(|| format!("{CLIENT_ID_ENV} is not set (Azure app client ID)"))?;
        let email = get(EMAIL_ENV).with_context(|| format!("{EMAIL_ENV} is not set"))?;
        if !email.contains('@') {
            bail!("{EMAIL_ENV} must be an email address, got {email:?}");
        }

        let token_file = match get(TOKEN_FILE_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_token_file()?,
        };

        Ok(Self {
            client_id,
            email,
            folder: get(FOLDER_ENV).unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            token_file,
            token_key: get(TOKEN_KEY_ENV),
        })
    }
}

fn default_token_file() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("no configuration directory on this platform")?;
    Ok(dir.join("mailtether").join(DEFAULT_TOKEN_FILE))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[
            (CLIENT_ID_ENV, "cid"),
            (EMAIL_ENV, "me@outlook.com"),
            (TOKEN_FILE_ENV, "/tmp/tokens.json"),
        ])
        .unwrap();
        assert_eq!(s.folder, "INBOX");
        assert_eq!(s.token_file, PathBuf::from("/tmp/tokens.json"));
        assert_eq!(s.token_key, None);
    }

    #[test]
    fn test_missing_client_id() {
        let err = settings(&[(EMAIL_ENV, "me@outlook.com")]).unwrap_err();
        assert!(err.to_string().contains(CLIENT_ID_ENV));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let s = settings(&[
            (CLIENT_ID_ENV, "cid"),
            (EMAIL_ENV, "me@outlook.com"),
            (TOKEN_FILE_ENV, "/tmp/t.json"),
            (FOLDER_ENV, "Archive"),
            (TOKEN_KEY_ENV, "  "),
        ])
        .unwrap();
        assert_eq!(s.folder, "Archive");
        assert_eq!(s.token_key, None);
    }

    #[test]
    fn test_rejects_non_address() {
        assert!(settings(&[(CLIENT_ID_ENV, "cid"), (EMAIL_ENV, "me")]).is_err());
    }
}
