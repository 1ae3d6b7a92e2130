//! Managed mail sessions.
//!
//! A [`SessionManager`] owns a registry of [`ManagedSession`]s. Every
//! keep-alive interval it visits each session concurrently, probes its
//! [`MailTransport`], reconnects it through the session's [`Connector`] when
//! the probe fails, and publishes the result on the session's [`Lifecycle`].
//!
//! ```text
//! manage(transport, connector)
//!        │ initial attempt
//!        ▼
//!   registry ──► sweep (every keep_alive_interval)
//!                  ├─ probe() ── connected ──────────────┐
//!                  └─ disconnected ─► connector.connect()│
//!                                     └─ connection event ▼
//!                                                  keep-alive event
//! ```

mod attempt;
mod lifecycle;
mod managed;
mod manager;
mod transport;

pub use attempt::{Connector, CredentialConnector};
pub use lifecycle::{Lifecycle, ListenerId, Listeners};
pub use managed::{ConnectionOutcome, ManagedSession};
pub use manager::{ExceptionHandler, SessionManager};
pub use transport::{
    AuthMethod, Connection, FolderEvent, FolderSubscription, MailTransport, NewMessage,
};
