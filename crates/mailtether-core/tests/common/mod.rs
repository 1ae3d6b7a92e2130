//! In-memory transport shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use mailtether_core::{
    AuthMethod, Connection, ConnectionOutcome, Error, FolderEvent, FolderSubscription,
    MailTransport, NewMessage, Result,
};
use tokio::sync::mpsc;

/// Transport whose connection state is flipped by the test.
#[derive(Debug)]
pub struct MockTransport {
    id: String,
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    subscriptions: AtomicUsize,
    feeds: Mutex<Vec<mpsc::Sender<FolderEvent>>>,
}

impl MockTransport {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
            feeds: Mutex::new(Vec::new()),
        })
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Subscriptions whose receiver is still alive.
    pub fn live_feeds(&self) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|feed| !feed.is_closed())
            .count()
    }

    /// Pushes `event` to every live subscription.
    pub async fn push(&self, event: FolderEvent) {
        let feeds: Vec<_> = self.feeds.lock().unwrap().clone();
        for feed in feeds {
            let _ = feed.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self, _method: AuthMethod, username: &str, _secret: &str) -> ConnectionOutcome {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        ConnectionOutcome::Connected(Connection {
            username: username.to_string(),
            host: "mock".to_string(),
            port: 0,
            connected_at: Utc::now(),
            capabilities: vec!["IMAP4rev1".to_string(), "IDLE".to_string()],
        })
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection(&self) -> Result<Connection> {
        Err(Error::NotConnected)
    }

    async fn subscribe(&self, folder: &str) -> Result<FolderSubscription> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().unwrap().push(tx);
        Ok(FolderSubscription::new(folder.to_string(), rx, None))
    }
}

/// Connector that logs the transport in with a password.
pub async fn password_login(session: Arc<dyn MailTransport>) -> ConnectionOutcome {
    session.connect(AuthMethod::Password, "user@example.com", "secret").await
}

pub fn message(seq: u32, subject: &str) -> FolderEvent {
    FolderEvent::NewMessage(NewMessage {
        folder: "INBOX".to_string(),
        seq,
        subject: Some(subject.to_string()),
        from: Some("ann@corp.io".to_string()),
    })
}
