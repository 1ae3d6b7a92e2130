//! Manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`ManagerConfig::keep_alive_interval`].
pub const KEEP_ALIVE_ENV: &str = "MAILTETHER_KEEP_ALIVE_MS";
/// Environment variable overriding [`ManagerConfig::reconnect_timeout`].
pub const RECONNECT_TIMEOUT_ENV: &str = "MAILTETHER_RECONNECT_TIMEOUT_MS";

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(30_000);
const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Timing of the keep-alive sweep.
///
/// Serialized with millisecond fields:
///
/// ```json
/// { "keep_alive_interval_ms": 30000, "reconnect_timeout_ms": 5000 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Pause between two sweeps.
    #[serde(rename = "keep_alive_interval_ms", with = "millis")]
    pub keep_alive_interval: Duration,
    /// Deadline for one session's probe, reconnect and listeners.
    #[serde(rename = "reconnect_timeout_ms", with = "millis")]
    pub reconnect_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    /// Starts a builder from the defaults.
    #[must_use]
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Defaults overridden by `MAILTETHER_KEEP_ALIVE_MS` and
    /// `MAILTETHER_RECONNECT_TIMEOUT_MS` when set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but is not a positive
    /// integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(ms) = parse_millis(KEEP_ALIVE_ENV, lookup(KEEP_ALIVE_ENV))? {
            builder = builder.keep_alive_interval(ms);
        }
        if let Some(ms) = parse_millis(RECONNECT_TIMEOUT_ENV, lookup(RECONNECT_TIMEOUT_ENV))? {
            builder = builder.reconnect_timeout(ms);
        }
        builder.build()
    }
}

fn parse_millis(name: &str, value: Option<String>) -> Result<Option<Duration>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(Error::Config(format!(
            "{name} must be a positive number of milliseconds, got {value:?}"
        ))),
    }
}

/// Builder for [`ManagerConfig`].
#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
}

impl ManagerConfigBuilder {
    /// Sets the pause between sweeps.
    #[must_use]
    pub const fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config.keep_alive_interval = interval;
        self
    }

    /// Sets the per-session deadline.
    #[must_use]
    pub const fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect_timeout = timeout;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either duration is zero.
    pub fn build(self) -> Result<ManagerConfig> {
        if self.config.keep_alive_interval.is_zero() {
            return Err(Error::Config("keep-alive interval must be non-zero".into()));
        }
        if self.config.reconnect_timeout.is_zero() {
            return Err(Error::Config("reconnect timeout must be non-zero".into()));
        }
        Ok(self.config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
