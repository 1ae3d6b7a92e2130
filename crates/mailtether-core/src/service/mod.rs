//! Concrete mail transports.

mod imap_session;

pub use imap_session::{AuthClient, DEFAULT_IDLE_TIMEOUT, ImapMailSession, SelectedClient};
