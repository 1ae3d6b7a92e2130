//! A transport under management and the outcome of its connection attempts.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Connection, Connector, Lifecycle, MailTransport};
use crate::error::{Error, Result};

/// Result of one connection attempt.
#[derive(Debug, Clone)]
pub enum ConnectionOutcome {
    /// The transport is connected.
    Connected(Connection),
    /// The attempt failed.
    Failed(Arc<Error>),
}

impl ConnectionOutcome {
    /// Failed outcome from any error convertible into [`Error`].
    pub fn failed(error: impl Into<Error>) -> Self {
        Self::Failed(Arc::new(error.into()))
    }

    /// True for [`ConnectionOutcome::Connected`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Connection details on success.
    #[must_use]
    pub const fn connection(&self) -> Option<&Connection> {
        match self {
            Self::Connected(connection) => Some(connection),
            Self::Failed(_) => None,
        }
    }

    /// The error on failure.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Connected(_) => None,
            Self::Failed(error) => Some(error),
        }
    }
}

/// A transport registered with a
/// [`SessionManager`](super::SessionManager), plus its keep-alive state.
pub struct ManagedSession {
    session: Arc<dyn MailTransport>,
    connector: Arc<dyn Connector>,
    lifecycle: Lifecycle,
    initial_connection: ConnectionOutcome,
    last_connection: Mutex<ConnectionOutcome>,
    last_keep_alive_check: Mutex<DateTime<Utc>>,
}

impl fmt::Debug for ManagedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedSession")
            .field("id", &self.id())
            .field("connected", &self.session.is_connected())
            .field("last_keep_alive_check", &self.last_keep_alive_check())
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl ManagedSession {
    pub(crate) fn new(
        session: Arc<dyn MailTransport>,
        connector: Arc<dyn Connector>,
        initial_connection: ConnectionOutcome,
    ) -> Self {
        Self {
            session,
            connector,
            lifecycle: Lifecycle::default(),
            last_connection: Mutex::new(initial_connection.clone()),
            initial_connection,
            last_keep_alive_check: Mutex::new(Utc::now()),
        }
    }

    /// Identifier of the transport.
    #[must_use]
    pub fn id(&self) -> &str {
        self.session.id()
    }

    /// The managed transport.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn MailTransport> {
        &self.session
    }

    /// The connector used for reconnection.
    #[must_use]
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Listeners for this session's events.
    #[must_use]
    pub const fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Outcome of the attempt made at registration.
    #[must_use]
    pub const fn initial_connection(&self) -> &ConnectionOutcome {
        &self.initial_connection
    }

    /// Outcome of the most recent attempt.
    #[must_use]
    pub fn last_connection(&self) -> ConnectionOutcome {
        self.last_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// When the sweep last visited this session (registration time before
    /// the first visit).
    #[must_use]
    pub fn last_keep_alive_check(&self) -> DateTime<Utc> {
        *self
            .last_keep_alive_check
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// One keep-alive cycle: stamp, probe, reconnect if needed, then notify.
    ///
    /// A failed reconnect still notifies connection listeners but skips the
    /// keep-alive tick.
    pub(crate) async fn keep_alive(&self) -> Result<()> {
        *self
            .last_keep_alive_check
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();

        if self.session.probe().await {
            debug!(session = self.id(), "session is connected");
        } else {
            info!(session = self.id(), "session is not connected, reconnecting");
            let outcome = self.connector.connect(Arc::clone(&self.session)).await;
            *self
                .last_connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = outcome.clone();
            self.lifecycle.connection.emit(&outcome);

            if let ConnectionOutcome::Failed(error) = outcome {
                return Err(Error::Reconnect(error));
            }
            info!(session = self.id(), "session reconnected");
        }

        self.lifecycle.keep_alive.emit(&());
        Ok(())
    }
}
