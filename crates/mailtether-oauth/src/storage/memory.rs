//! In-memory token storage.

use std::sync::{Arc, Mutex, PoisonError};

use super::TokenStorage;
use crate::Result;

/// Keeps the token in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn store(&self, token: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slot() {
        let storage = MemoryTokenStorage::new();
        let view = storage.clone();
        assert_eq!(view.load().unwrap(), None);
        storage.store("t1").unwrap();
        assert_eq!(view.load().unwrap().as_deref(), Some("t1"));
    }
}
