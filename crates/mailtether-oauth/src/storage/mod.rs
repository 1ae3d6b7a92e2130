//! Token persistence.
//!
//! A [`TokenStorage`] holds one serialized [`Token`](crate::Token) for one
//! account. Backends:
//!
//! - [`FileTokenStorage`]: a JSON map `{ username: token }` shared by accounts
//! - [`KeyringTokenStorage`]: the platform credential store
//! - [`EncryptedTokenStorage`]: AES-256-GCM wrapper around any backend
//! - [`MemoryTokenStorage`]: process-local, for tests and short-lived tools

mod encrypted;
mod file;
mod keyring;
mod memory;

use std::sync::Arc;

pub use self::encrypted::EncryptedTokenStorage;
pub use self::file::{DEFAULT_TOKEN_FILE, FileTokenStorage};
pub use self::keyring::KeyringTokenStorage;
pub use self::memory::MemoryTokenStorage;
use crate::Result;

/// Persists the serialized token of one account.
pub trait TokenStorage: Send + Sync {
    /// Replaces the stored token.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    fn store(&self, token: &str) -> Result<()>;

    /// Returns the stored token, or `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    fn load(&self) -> Result<Option<String>>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    fn store(&self, token: &str) -> Result<()> {
        (**self).store(token)
    }

    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }
}

impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn store(&self, token: &str) -> Result<()> {
        (**self).store(token)
    }

    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }
}
