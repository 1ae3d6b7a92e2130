//! The keep-alive sweep.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Connector, MailTransport, ManagedSession};
use crate::config::ManagerConfig;
use crate::error::{Error, panic_message};

/// Receives every per-session failure of the sweep: reconnect errors,
/// timeouts and panics.
pub type ExceptionHandler = Arc<dyn Fn(&Error, &ManagedSession) + Send + Sync>;

struct Shared {
    config: ManagerConfig,
    registry: RwLock<Vec<Arc<ManagedSession>>>,
    on_error: ExceptionHandler,
}

/// Keeps a set of mail sessions connected.
///
/// Created with [`SessionManager::start`], which spawns the sweep on the
/// current tokio runtime. Each sweep visits every registered session
/// concurrently, bounded by [`ManagerConfig::reconnect_timeout`]; a failing
/// session never affects the others.
pub struct SessionManager {
    shared: Arc<Shared>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Starts a manager whose failures are logged.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(config: ManagerConfig) -> Self {
        Self::with_exception_handler(config, |error, managed| {
            error!(session = managed.id(), error = %error, "keep-alive failed");
        })
    }

    /// Starts a manager that reports failures to `handler`.
    ///
    /// The handler runs on the sweep task. A panic inside it is logged and
    /// swallowed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn with_exception_handler<H>(config: ManagerConfig, handler: H) -> Self
    where
        H: Fn(&Error, &ManagedSession) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            config,
            registry: RwLock::new(Vec::new()),
            on_error: Arc::new(handler),
        });
        let sweep = tokio::spawn(run(Arc::clone(&shared)));
        info!(
            keep_alive_interval = ?config.keep_alive_interval,
            reconnect_timeout = ?config.reconnect_timeout,
            "session manager started"
        );
        Self {
            shared,
            sweep: Mutex::new(Some(sweep)),
        }
    }

    /// Connects `session` once through `connector` and registers it.
    ///
    /// The session is registered whether or not that first attempt
    /// succeeds; its outcome is available as
    /// [`ManagedSession::initial_connection`]. Later sweeps reuse
    /// `connector` whenever the session is found disconnected.
    ///
    /// Once [`SessionManager::stop`] has been called the session is
    /// disconnected again and not registered.
    pub async fn manage<C>(
        &self,
        session: Arc<dyn MailTransport>,
        connector: C,
    ) -> Arc<ManagedSession>
    where
        C: Connector + 'static,
    {
        let connector: Arc<dyn Connector> = Arc::new(connector);
        let outcome = connector.connect(Arc::clone(&session)).await;
        match outcome.error() {
            None => info!(session = session.id(), "session connected"),
            Some(e) => info!(session = session.id(), error = %e, "initial connection failed"),
        }

        let managed = Arc::new(ManagedSession::new(session, connector, outcome));
        {
            let mut registry = self.shared.registry.write().await;
            // checked under the registry lock so `stop` either sees the
            // entry or we see the stop
            if self.is_stopped() {
                drop(registry);
                warn!(session = managed.id(), "manager is stopped, disconnecting session");
                managed.session().disconnect().await;
                return managed;
            }
            registry.push(Arc::clone(&managed));
        }
        managed
    }

    /// Stops the sweep and disconnects every registered session.
    ///
    /// Keep-alive cycles still in flight are cancelled before any session is
    /// disconnected. With `clear_registry` the registry is emptied; otherwise
    /// the sessions stay visible through [`SessionManager::sessions`] but are
    /// no longer swept. Calling it again only repeats the disconnects.
    pub async fn stop(&self, clear_registry: bool) {
        let sweep = self
            .sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweep) = sweep {
            sweep.abort();
            // the sweep drops its per-session tasks, aborting them
            if let Err(e) = sweep.await
                && e.is_panic()
            {
                error!(panic = %panic_message(&*e.into_panic()), "sweep task panicked");
            }
            info!("session manager stopped");
        }

        let sessions = self.sessions().await;
        for managed in &sessions {
            managed.session().disconnect().await;
        }
        if clear_registry {
            self.shared.registry.write().await.clear();
        }
    }

    /// Snapshot of the registered sessions.
    pub async fn sessions(&self) -> Vec<Arc<ManagedSession>> {
        self.shared.registry.read().await.clone()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.shared.registry.read().await.len()
    }

    /// True if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.shared.registry.read().await.is_empty()
    }

    fn is_stopped(&self) -> bool {
        self.sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// True until [`SessionManager::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sweep| !sweep.is_finished())
    }

    /// The manager's timing.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(sweep) = self
            .sweep
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweep.abort();
        }
    }
}

/// Per-session task of a sweep; cancelled when the sweep itself is.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run(shared: Arc<Shared>) {
    loop {
        shared.sweep().await;
        tokio::time::sleep(shared.config.keep_alive_interval).await;
    }
}

impl Shared {
    async fn sweep(&self) {
        let snapshot = self.registry.read().await.clone();
        debug!(sessions = snapshot.len(), "checking managed sessions");

        let timeout = self.config.reconnect_timeout;
        let tasks: Vec<_> = snapshot
            .into_iter()
            .map(|managed| {
                let visited = Arc::clone(&managed);
                let task = AbortOnDrop(tokio::spawn(async move {
                    tokio::time::timeout(timeout, visited.keep_alive())
                        .await
                        .map_err(|_| Error::Timeout(timeout))?
                }));
                (managed, task)
            })
            .collect();

        for (managed, mut task) in tasks {
            let result = match (&mut task.0).await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(Error::Panicked(panic_message(&*e.into_panic()))),
                Err(e) => {
                    debug!(session = managed.id(), error = %e, "keep-alive task cancelled");
                    continue;
                }
            };
            if let Err(error) = result {
                self.report(&error, &managed);
            }
        }
    }

    fn report(&self, error: &Error, managed: &ManagedSession) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (self.on_error)(error, managed))) {
            error!(
                session = managed.id(),
                panic = %panic_message(&*payload),
                "exception handler panicked"
            );
        }
    }
}
