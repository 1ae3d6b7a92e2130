//! New-message notifications for a folder.
//!
//! [`watch_folder`] follows a single subscription. [`FolderWatcher`] ties a
//! watch to a [`ManagedSession`] so it is re-armed after every reconnect.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, panic_message};
pub use crate::session::NewMessage;
use crate::session::{FolderEvent, ListenerId, MailTransport, ManagedSession};

type MessageCallback = Arc<dyn Fn(NewMessage) + Send + Sync>;

/// A running folder watch. The watch continues until [`close`](Self::close)
/// is called or its connection ends.
#[derive(Debug)]
pub struct FolderWatchHandle {
    folder: String,
    consumer: AbortHandle,
}

impl FolderWatchHandle {
    /// Watched folder.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Stops the watch and releases its connection.
    pub fn close(&self) {
        self.consumer.abort();
    }

    /// True once closed or once the subscription has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.consumer.is_finished()
    }
}

/// Subscribes to `folder` on `session` and calls `on_message` for every new
/// message.
///
/// A panic in `on_message` is logged and the watch keeps running.
///
/// # Errors
///
/// Returns the transport's subscription error.
pub async fn watch_folder<F>(
    session: &dyn MailTransport,
    folder: &str,
    on_message: F,
) -> Result<FolderWatchHandle>
where
    F: Fn(NewMessage) + Send + Sync + 'static,
{
    let mut subscription = session.subscribe(folder).await?;
    let name = folder.to_string();

    let consumer = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match event {
                FolderEvent::NewMessage(message) => {
                    let seq = message.seq;
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_message(message))) {
                        error!(
                            folder = subscription.folder(),
                            seq,
                            panic = %panic_message(&*payload),
                            "message callback panicked"
                        );
                    }
                }
                FolderEvent::Expunged(seq) => {
                    debug!(folder = subscription.folder(), seq, "message expunged");
                }
                FolderEvent::Disconnected(reason) => {
                    info!(folder = subscription.folder(), %reason, "folder watch ended");
                    break;
                }
            }
        }
    });

    Ok(FolderWatchHandle {
        folder: name,
        consumer: consumer.abort_handle(),
    })
}

/// Keeps a folder watch alive across reconnects of a managed session.
///
/// - armed on attach if the session is connected
/// - re-armed on every successful connection event
/// - closed on a failed connection event
/// - re-armed on a keep-alive tick if the watch has ended while the session
///   stayed up
pub struct FolderWatcher {
    folder: String,
    session: Arc<dyn MailTransport>,
    managed: Weak<ManagedSession>,
    on_message: MessageCallback,
    watch: Mutex<Option<FolderWatchHandle>>,
    arming: AtomicBool,
    listeners: Mutex<Vec<ListenerKind>>,
}

enum ListenerKind {
    Connection(ListenerId),
    KeepAlive(ListenerId),
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("folder", &self.folder)
            .field("session", &self.session.id())
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl FolderWatcher {
    /// Attaches a watch of `folder` to `managed`.
    pub async fn attach<F>(
        managed: &Arc<ManagedSession>,
        folder: &str,
        on_message: F,
    ) -> Arc<Self>
    where
        F: Fn(NewMessage) + Send + Sync + 'static,
    {
        let watcher = Arc::new(Self {
            folder: folder.to_string(),
            session: Arc::clone(managed.session()),
            managed: Arc::downgrade(managed),
            on_message: Arc::new(on_message),
            watch: Mutex::new(None),
            arming: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        });

        let on_connection = Arc::downgrade(&watcher);
        let connection = managed.lifecycle().connection.add(move |outcome| {
            let Some(watcher) = on_connection.upgrade() else {
                return;
            };
            if outcome.is_success() {
                tokio::spawn(watcher.arm());
            } else {
                watcher.close_watch();
            }
        });

        let on_tick = Arc::downgrade(&watcher);
        let keep_alive = managed.lifecycle().keep_alive.add(move |()| {
            let Some(watcher) = on_tick.upgrade() else {
                return;
            };
            if !watcher.is_watching() {
                tokio::spawn(watcher.arm());
            }
        });

        watcher.lock_listeners().extend([
            ListenerKind::Connection(connection),
            ListenerKind::KeepAlive(keep_alive),
        ]);

        if watcher.session.is_connected() {
            Arc::clone(&watcher).arm().await;
        }
        watcher
    }

    /// Watched folder.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// True while a watch is running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.lock_watch()
            .as_ref()
            .is_some_and(|watch| !watch.is_closed())
    }

    /// Removes the lifecycle listeners and closes the current watch.
    pub fn detach(&self) {
        let listeners = std::mem::take(&mut *self.lock_listeners());
        if let Some(managed) = self.managed.upgrade() {
            for listener in listeners {
                match listener {
                    ListenerKind::Connection(id) => managed.lifecycle().connection.remove(id),
                    ListenerKind::KeepAlive(id) => managed.lifecycle().keep_alive.remove(id),
                };
            }
        }
        self.close_watch();
    }

    async fn arm(self: Arc<Self>) {
        // one subscription attempt at a time
        if self.arming.swap(true, Ordering::AcqRel) {
            return;
        }

        let on_message = Arc::clone(&self.on_message);
        match watch_folder(self.session.as_ref(), &self.folder, move |m| on_message(m)).await {
            Ok(watch) => {
                if let Some(previous) = self.lock_watch().replace(watch) {
                    previous.close();
                }
                info!(session = self.session.id(), folder = %self.folder, "folder watch armed");
            }
            Err(e) => warn!(
                session = self.session.id(),
                folder = %self.folder,
                error = %e,
                "could not arm folder watch"
            ),
        }
        self.arming.store(false, Ordering::Release);
    }

    fn close_watch(&self) {
        if let Some(watch) = self.lock_watch().take() {
            watch.close();
            debug!(session = self.session.id(), folder = %self.folder, "folder watch closed");
        }
    }

    fn lock_watch(&self) -> std::sync::MutexGuard<'_, Option<FolderWatchHandle>> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<ListenerKind>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
