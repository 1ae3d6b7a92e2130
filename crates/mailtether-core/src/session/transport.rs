//! The transport abstraction driven by the session manager.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::ConnectionOutcome;
use crate::error::Result;

/// How [`MailTransport::connect`] authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethod {
    /// SASL XOAUTH2 with an access token as the secret.
    OAuth2,
    /// Plain `LOGIN` with a password as the secret.
    Password,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth2 => f.write_str("XOAUTH2"),
            Self::Password => f.write_str("LOGIN"),
        }
    }
}

/// Details of an established connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Authenticated account.
    pub username: String,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// When authentication completed.
    pub connected_at: DateTime<Utc>,
    /// Capabilities advertised after authentication.
    pub capabilities: Vec<String>,
}

/// A message announced by a folder subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Folder the message arrived in.
    pub folder: String,
    /// Message sequence number.
    pub seq: u32,
    /// `Subject` header, if present.
    pub subject: Option<String>,
    /// `From` header, if present.
    pub from: Option<String>,
}

/// Event pushed by a [`FolderSubscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    /// A message was added to the folder.
    NewMessage(NewMessage),
    /// The message with this sequence number was removed.
    Expunged(u32),
    /// The subscription's connection ended; no further events follow.
    Disconnected(String),
}

/// Stream of push events for one folder.
///
/// Dropping the subscription stops the task feeding it.
#[derive(Debug)]
pub struct FolderSubscription {
    folder: String,
    events: mpsc::Receiver<FolderEvent>,
    feeder: Option<AbortHandle>,
}

impl FolderSubscription {
    /// Wraps an event channel. `feeder`, if given, is aborted when the
    /// subscription is closed or dropped.
    #[must_use]
    pub const fn new(
        folder: String,
        events: mpsc::Receiver<FolderEvent>,
        feeder: Option<AbortHandle>,
    ) -> Self {
        Self {
            folder,
            events,
            feeder,
        }
    }

    /// Subscribed folder.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Next event, or `None` once the feeder has stopped.
    pub async fn recv(&mut self) -> Option<FolderEvent> {
        self.events.recv().await
    }

    /// Stops the feeder.
    pub fn close(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.events.close();
    }
}

impl Drop for FolderSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// A mail connection the session manager can probe and reconnect.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Caller-chosen identifier.
    fn id(&self) -> &str;

    /// Authenticates with `secret` (access token or password). Failures are
    /// reported in the outcome, never as a panic.
    async fn connect(&self, method: AuthMethod, username: &str, secret: &str)
    -> ConnectionOutcome;

    /// Closes the connection. Always leaves the transport disconnected.
    async fn disconnect(&self);

    /// Cached connection state.
    fn is_connected(&self) -> bool;

    /// Liveness check issued once per keep-alive cycle. Transports that can
    /// talk to the server should do so and drop a dead connection.
    async fn probe(&self) -> bool {
        self.is_connected()
    }

    /// Details of the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotConnected`] if not connected.
    fn connection(&self) -> Result<Connection>;

    /// Subscribes to push events for `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotConnected`] if the transport has never
    /// connected, or the error opening the folder.
    async fn subscribe(&self, folder: &str) -> Result<FolderSubscription>;
}
