//! [`MailTransport`] over the IMAP client.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mailtether_imap::{Authenticated, Client, Config, IdleEvent, ImapStream, Security, Selected};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, panic_message};
use crate::session::{
    AuthMethod, Connection, ConnectionOutcome, FolderEvent, FolderSubscription, MailTransport,
    NewMessage,
};

/// Authenticated IMAP client.
pub type AuthClient = Client<ImapStream, Authenticated>;

/// IMAP client with a mailbox open.
pub type SelectedClient = Client<ImapStream, Selected>;

/// IDLE is re-issued after this long without activity (RFC 2177 asks
/// clients to do so before 29 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const OUTLOOK_HOST: &str = "outlook.office365.com";
const HEADER_FIELDS: &[&str] = &["Subject", "From"];
const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
struct Login {
    method: AuthMethod,
    username: String,
    secret: String,
}

#[derive(Default)]
struct State {
    connection: Option<Connection>,
    login: Option<Login>,
    pending: Option<AbortHandle>,
    generation: u64,
}

/// An IMAP mailbox session.
///
/// Keeps one authenticated connection for probing. Folder subscriptions
/// open a connection of their own with the last successful login.
pub struct ImapMailSession {
    id: String,
    config: Config,
    idle_timeout: Duration,
    client: tokio::sync::Mutex<Option<AuthClient>>,
    state: Mutex<State>,
}

impl std::fmt::Debug for ImapMailSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailSession")
            .field("id", &self.id)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl ImapMailSession {
    /// Session `id` against the server described by `config`.
    #[must_use]
    pub fn new(id: impl Into<String>, config: Config) -> Self {
        Self {
            id: id.into(),
            config,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            client: tokio::sync::Mutex::new(None),
            state: Mutex::new(State::default()),
        }
    }

    /// Session against Outlook / Office 365 (implicit TLS on port 993).
    #[must_use]
    pub fn outlook(id: impl Into<String>) -> Self {
        let config = Config::builder(OUTLOOK_HOST)
            .security(Security::Implicit)
            .port(993)
            .build();
        Self::new(id, config)
    }

    /// Sets how long a folder subscription idles before re-issuing IDLE.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Server configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_disconnected(&self) {
        self.state().connection = None;
    }
}

async fn open(config: &Config, login: &Login) -> mailtether_imap::Result<AuthClient> {
    let client = Client::connect(config).await?;
    match login.method {
        AuthMethod::OAuth2 => {
            client
                .authenticate_xoauth2(&login.username, &login.secret)
                .await
        }
        AuthMethod::Password => client.login(&login.username, &login.secret).await,
    }
}

#[async_trait]
impl MailTransport for ImapMailSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self, method: AuthMethod, username: &str, secret: &str) -> ConnectionOutcome {
        let login = Login {
            method,
            username: username.to_string(),
            secret: secret.to_string(),
        };

        let config = self.config.clone();
        let task_login = login.clone();
        let task = tokio::spawn(async move { open(&config, &task_login).await });

        let generation = {
            let mut state = self.state();
            if let Some(previous) = state.pending.replace(task.abort_handle()) {
                debug!(session = %self.id, "cancelling previous connect");
                previous.abort();
            }
            state.generation += 1;
            state.generation
        };

        let joined = task.await;
        {
            let mut state = self.state();
            if state.generation == generation {
                state.pending = None;
            }
        }

        let client = match joined {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                warn!(session = %self.id, error = %e, "connect failed");
                return ConnectionOutcome::failed(e);
            }
            Err(e) if e.is_cancelled() => {
                return ConnectionOutcome::failed(Error::Superseded);
            }
            Err(e) => {
                return ConnectionOutcome::failed(Error::Panicked(panic_message(
                    &*e.into_panic(),
                )));
            }
        };

        let connection = Connection {
            username: login.username.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            connected_at: Utc::now(),
            capabilities: client.capabilities().to_vec(),
        };

        let previous = self.client.lock().await.replace(client);
        {
            let mut state = self.state();
            state.connection = Some(connection.clone());
            state.login = Some(login);
        }
        if let Some(previous) = previous {
            previous.logout().await;
        }

        info!(session = %self.id, host = %connection.host, "connected");
        ConnectionOutcome::Connected(connection)
    }

    async fn disconnect(&self) {
        if let Some(pending) = self.state().pending.take() {
            pending.abort();
        }
        let client = self.client.lock().await.take();
        self.mark_disconnected();
        if let Some(client) = client {
            client.logout().await;
            info!(session = %self.id, "disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.state().connection.is_some()
    }

    async fn probe(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        let mut client = self.client.lock().await;
        let Some(active) = client.as_mut() else {
            self.mark_disconnected();
            return false;
        };

        match active.noop().await {
            Ok(()) => true,
            Err(e) if e.is_connection_lost() => {
                warn!(session = %self.id, error = %e, "connection lost");
                *client = None;
                self.mark_disconnected();
                false
            }
            Err(e) => {
                debug!(session = %self.id, error = %e, "NOOP rejected, connection still usable");
                true
            }
        }
    }

    fn connection(&self) -> Result<Connection> {
        self.state().connection.clone().ok_or(Error::NotConnected)
    }

    async fn subscribe(&self, folder: &str) -> Result<FolderSubscription> {
        let login = self.state().login.clone().ok_or(Error::NotConnected)?;

        let client = open(&self.config, &login).await?;
        let selected = client.examine(folder).await?;
        if !selected.supports_idle() {
            selected.logout().await;
            return Err(Error::Imap(mailtether_imap::Error::InvalidState(
                "server does not support IDLE".to_string(),
            )));
        }

        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let feeder = tokio::spawn(feed(
            selected,
            folder.to_string(),
            self.idle_timeout,
            events,
        ));
        info!(session = %self.id, folder, "folder subscription started");
        Ok(FolderSubscription::new(
            folder.to_string(),
            rx,
            Some(feeder.abort_handle()),
        ))
    }
}

/// Runs IDLE on `client` until the connection fails or the subscriber goes
/// away, then reports why.
async fn feed(
    mut client: SelectedClient,
    folder: String,
    idle_timeout: Duration,
    events: mpsc::Sender<FolderEvent>,
) {
    let reason = match pump(&mut client, &folder, idle_timeout, &events).await {
        Ok(()) => "subscription closed".to_string(),
        Err(e) => {
            warn!(folder = %folder, error = %e, "folder subscription ended");
            e.to_string()
        }
    };
    // the subscriber may already be gone
    let _ = events.send(FolderEvent::Disconnected(reason)).await;
    client.logout().await;
}

async fn pump(
    client: &mut SelectedClient,
    folder: &str,
    idle_timeout: Duration,
    events: &mpsc::Sender<FolderEvent>,
) -> mailtether_imap::Result<()> {
    let mut known = client.exists();

    while !events.is_closed() {
        let event = {
            let mut idle = client.idle().await?;
            let event = idle.wait(idle_timeout).await?;
            idle.done().await?;
            event
        };

        if let IdleEvent::Expunge(seq) = event {
            known = known.saturating_sub(1);
            if events.send(FolderEvent::Expunged(seq)).await.is_err() {
                break;
            }
        }

        let exists = client.exists();
        if exists > known {
            for headers in client.fetch_headers(known + 1, exists, HEADER_FIELDS).await? {
                let message = NewMessage {
                    folder: folder.to_string(),
                    seq: headers.seq,
                    subject: headers.subject().map(str::to_string),
                    from: headers.from().map(str::to_string),
                };
                if events.send(FolderEvent::NewMessage(message)).await.is_err() {
                    return Ok(());
                }
            }
        }
        known = exists;
    }
    Ok(())
}
