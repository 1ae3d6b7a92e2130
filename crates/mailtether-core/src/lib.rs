//! # mailtether-core
//!
//! Keeps long-lived mailbox sessions connected.
//!
//! This crate provides:
//! - [`SessionManager`]: periodic keep-alive sweep with per-session
//!   reconnection, timeouts and failure isolation
//! - [`MailTransport`] and the IMAP implementation [`ImapMailSession`]
//! - [`Connector`] and [`CredentialConnector`], which logs in through an
//!   `OAuth2` [`CredentialProvider`](mailtether_oauth::CredentialProvider)
//! - lifecycle listeners for connection and keep-alive events
//! - folder watches that survive reconnects ([`FolderWatcher`])
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use mailtether_core::{
//!     CredentialConnector, FolderWatcher, ImapMailSession, ManagerConfig, SessionManager,
//! };
//!
//! let manager = SessionManager::start(ManagerConfig::from_env()?);
//! let session = Arc::new(ImapMailSession::outlook("work"));
//! let managed = manager
//!     .manage(session, CredentialConnector::new(credential_provider))
//!     .await;
//!
//! FolderWatcher::attach(&managed, "INBOX", |message| {
//!     println!("{:?} from {:?}", message.subject, message.from);
//! })
//! .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod folder;
pub mod service;
pub mod session;

pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use error::{Error, Result};
pub use folder::{FolderWatchHandle, FolderWatcher, watch_folder};
pub use service::{AuthClient, ImapMailSession, SelectedClient};
pub use session::{
    AuthMethod, Connection, ConnectionOutcome, Connector, CredentialConnector, ExceptionHandler,
    FolderEvent, FolderSubscription, Lifecycle, ListenerId, Listeners, MailTransport,
    ManagedSession, NewMessage, SessionManager,
};
