//! Type-state IMAP client.
//!
//! `Client<S, State>` only exposes the commands valid in `State`:
//!
//! - [`NotAuthenticated`]: right after the greeting
//! - [`Authenticated`]: after LOGIN or AUTHENTICATE
//! - [`Selected`]: after SELECT or EXAMINE

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::response::{Response, Status, Untagged};
use crate::{Error, Result};

/// IMAP client connection in state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<String>,
    pub(crate) io_timeout: Option<Duration>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Server capabilities as last announced.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Case-insensitive capability check.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true if the server supports IDLE (RFC 2177).
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.has_capability("IDLE")
    }

    /// Bounds every subsequent command round trip by `timeout`.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Sends NOOP. Used as a liveness probe: any error means the
    /// connection should be considered gone.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(Command::Noop).await.map(drop)
    }

    /// Re-queries CAPABILITY and stores the result.
    pub async fn capability(&mut self) -> Result<&[String]> {
        self.execute(Command::Capability).await?;
        Ok(&self.capabilities)
    }

    /// Sends LOGOUT and closes the connection. Errors are ignored: the
    /// connection is going away either way.
    pub async fn logout(mut self) {
        let tag = self.tag_gen.next();
        if self.stream.write_all(&Command::Logout.serialize(&tag)).await.is_ok() {
            // drain until the tagged OK or the server hangs up
            while let Ok(resp) = self.stream.next_response().await {
                if resp.is_tagged(&tag) {
                    break;
                }
            }
        }
        let _ = self.stream.shutdown().await;
    }

    pub(crate) fn transition<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            io_timeout: self.io_timeout,
            state,
        }
    }

    /// Sends `command` and collects untagged data until its tagged
    /// completion, honouring the I/O timeout.
    pub(crate) async fn execute(&mut self, command: Command) -> Result<Vec<Untagged>> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute_inner(command))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.execute_inner(command).await,
        }
    }

    async fn execute_inner(&mut self, command: Command) -> Result<Vec<Untagged>> {
        let tag = self.tag_gen.next();
        trace!(%tag, command = command.name(), "sending");
        self.stream.write_all(&command.serialize(&tag)).await?;

        let mut untagged = Vec::new();
        loop {
            let response = self.stream.next_response().await?;
            if let Some(caps) = response.capabilities() {
                self.capabilities = caps;
            }

            match response {
                Response::Tagged {
                    tag: t,
                    status,
                    text,
                    ..
                } if t == tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(untagged),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Tagged { tag: t, .. } => {
                    return Err(Error::Protocol(format!(
                        "unexpected tag {t} while waiting for {tag}"
                    )));
                }
                Response::Continuation { text } => {
                    if !matches!(command, Command::Authenticate { .. }) {
                        return Err(Error::Protocol(format!(
                            "unexpected continuation for {}",
                            command.name()
                        )));
                    }
                    let challenge = mailtether_oauth::sasl::decode_error_challenge(&text);
                    debug!(challenge = challenge.as_deref().unwrap_or(&text), "SASL error challenge");
                    // an empty response makes the server finish with a tagged NO
                    self.stream.write_all(b"\r\n").await?;
                }
                Response::Untagged(Untagged::Status {
                    status: Status::Bye,
                    text,
                    ..
                }) => return Err(Error::Bye(text)),
                Response::Untagged(data) => untagged.push(data),
            }
        }
    }
}
