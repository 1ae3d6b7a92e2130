//! # mailtether-imap
//!
//! A small async IMAP client covering what a long-lived, push-driven mailbox
//! session needs: TLS connection setup, `LOGIN` / `AUTHENTICATE XOAUTH2`,
//! `SELECT` / `EXAMINE`, `NOOP` keep-alive probes, header `FETCH` and
//! `IDLE` (RFC 2177).
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtether_imap::{Client, Config};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mailtether_imap::Result<()> {
//!     let config = Config::new("outlook.office365.com");
//!     let client = Client::connect(&config).await?;
//!
//!     let client = client.authenticate_xoauth2("user@outlook.com", "token").await?;
//!     let mut inbox = client.examine("INBOX").await?;
//!     println!("Messages: {}", inbox.exists());
//!
//!     let mut idle = inbox.idle().await?;
//!     let event = idle.wait(Duration::from_secs(600)).await?;
//!     idle.done().await?;
//!     println!("{event:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login()/authenticate_xoauth2() ──→ Authenticated
//! Authenticated    ── select()/examine() ──────────────→ Selected
//! Selected         ── close() ─────────────────────────→ Authenticated
//! any state        ── logout() ────────────────────────→ (closed)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod response;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, IdleEvent, IdleHandle, ImapStream,
    MAX_LINE_LENGTH, MAX_LITERAL_SIZE, NotAuthenticated, Security, Selected,
};
pub use error::{Error, Result};
pub use response::{HeaderFields, MessageHeaders, Response, Status, Untagged};
