//! JSON file token storage.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::TokenStorage;
use crate::Result;

/// Default file name for the shared token map.
pub const DEFAULT_TOKEN_FILE: &str = "oauth2_tokens.json";

/// Stores tokens in a JSON object keyed by username, so several accounts can
/// share one file.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
    username: String,
}

impl FileTokenStorage {
    /// Storage for `username` in the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, username: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            username: username.into(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // write to a sibling file, then rename over the original
        let tmp = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp)?;
        file.write_all(serde_json::to_string_pretty(map)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn store(&self, token: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(self.username.clone(), token.to_string());
        self.write_map(&map)?;
        debug!(path = %self.path.display(), username = %self.username, "stored token");
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(&self.username))
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::File::create(path)
}
