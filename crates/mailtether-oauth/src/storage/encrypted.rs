//! AES-256-GCM encryption for stored tokens.
//!
//! Payloads are stored as base64(nonce || ciphertext) with a fresh random
//! 96-bit nonce per write.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;

use super::TokenStorage;
use crate::{Error, Result};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Encrypts tokens before handing them to the inner storage.
pub struct EncryptedTokenStorage<S> {
    inner: S,
    cipher: Aes256Gcm,
}

impl<S: std::fmt::Debug> std::fmt::Debug for EncryptedTokenStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedTokenStorage")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S: TokenStorage> EncryptedTokenStorage<S> {
    /// Wraps `inner` with a base64-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the key is not base64 or not 32 bytes.
    pub fn new(inner: S, key_base64: &str) -> Result<Self> {
        let key = BASE64
            .decode(key_base64.trim())
            .map_err(|e| Error::Crypto(format!("key is not valid base64: {e}")))?;
        if key.len() != KEY_SIZE {
            return Err(Error::Crypto(format!(
                "key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::Crypto(format!("invalid key: {e}")))?;
        Ok(Self { inner, cipher })
    }

    /// Generates a random key, base64-encoded, suitable for [`Self::new`].
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// The wrapped storage.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, payload: &str) -> Result<String> {
        let combined = BASE64
            .decode(payload.trim())
            .map_err(|e| Error::Crypto(format!("payload is not valid base64: {e}")))?;
        if combined.len() < NONCE_SIZE {
            return Err(Error::Crypto(format!(
                "payload too short: {} bytes",
                combined.len()
            )));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Crypto("decryption failed (wrong key or corrupted data)".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| Error::Crypto(format!("decrypted token is not UTF-8: {e}")))
    }
}

impl<S: TokenStorage> TokenStorage for EncryptedTokenStorage<S> {
    fn store(&self, token: &str) -> Result<()> {
        let payload = self.encrypt(token)?;
        self.inner.store(&payload)
    }

    fn load(&self) -> Result<Option<String>> {
        self.inner
            .load()?
            .map(|payload| self.decrypt(&payload))
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStorage;

    #[test]
    fn test_round_trip_hides_plaintext() {
        let backing = MemoryTokenStorage::new();
        let key = EncryptedTokenStorage::<MemoryTokenStorage>::generate_key();
        let storage = EncryptedTokenStorage::new(backing.clone(), &key).unwrap();

        storage.store(r#"{"access_token":"secret"}"#).unwrap();
        let raw = backing.load().unwrap().unwrap();
        assert!(!raw.contains("secret"));
        assert_eq!(
            storage.load().unwrap().as_deref(),
            Some(r#"{"access_token":"secret"}"#)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let backing = MemoryTokenStorage::new();
        let writer = EncryptedTokenStorage::new(
            backing.clone(),
            &EncryptedTokenStorage::<MemoryTokenStorage>::generate_key(),
        )
        .unwrap();
        writer.store("token").unwrap();

        let reader = EncryptedTokenStorage::new(
            backing,
            &EncryptedTokenStorage::<MemoryTokenStorage>::generate_key(),
        )
        .unwrap();
        assert!(matches!(reader.load(), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_nonce_is_fresh_per_write() {
        let backing = MemoryTokenStorage::new();
        let key = EncryptedTokenStorage::<MemoryTokenStorage>::generate_key();
        let storage = EncryptedTokenStorage::new(backing.clone(), &key).unwrap();
        storage.store("same").unwrap();
        let first = backing.load().unwrap();
        storage.store("same").unwrap();
        assert_ne!(first, backing.load().unwrap());
    }

    #[test]
    fn test_bad_keys_rejected() {
        let backing = MemoryTokenStorage::new();
        assert!(EncryptedTokenStorage::new(backing.clone(), "%%%").is_err());
        assert!(EncryptedTokenStorage::new(backing, &BASE64.encode([0u8; 16])).is_err());
    }

    #[test]
    fn test_corrupted_payload() {
        let backing = MemoryTokenStorage::with_token(BASE64.encode([1u8; 8]));
        let key = EncryptedTokenStorage::<MemoryTokenStorage>::generate_key();
        let storage = EncryptedTokenStorage::new(backing, &key).unwrap();
        assert!(matches!(storage.load(), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_empty_storage_passes_through() {
        let key = EncryptedTokenStorage::<MemoryTokenStorage>::generate_key();
        let storage = EncryptedTokenStorage::new(MemoryTokenStorage::new(), &key).unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
