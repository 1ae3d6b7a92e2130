//! IDLE support (RFC 2177).

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, timeout_at};
use tracing::trace;

use super::client::{Client, Selected};
use crate::command::Command;
use crate::response::{Response, Status, Untagged};
use crate::{Error, Result};

/// Mailbox change reported while idling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// Message count is now `n`.
    Exists(u32),
    /// Message `n` was expunged.
    Expunge(u32),
    /// Recent count is now `n`.
    Recent(u32),
    /// Flags of message `n` changed.
    Fetch(u32),
    /// Nothing happened before the deadline, or the server ended IDLE.
    Timeout,
}

/// An active IDLE command. Call [`IdleHandle::done`] to leave IDLE before
/// issuing another command.
pub struct IdleHandle<'a, S> {
    client: &'a mut Client<S, Selected>,
    tag: String,
    finished: bool,
}

impl<S> IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits up to `duration` for a mailbox change.
    ///
    /// Keep-alive chatter such as `* OK still here` is skipped without
    /// resetting the deadline.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleEvent> {
        if self.finished {
            return Ok(IdleEvent::Timeout);
        }
        let deadline = Instant::now() + duration;

        loop {
            let Ok(response) = timeout_at(deadline, self.client.stream.next_response()).await
            else {
                return Ok(IdleEvent::Timeout);
            };

            match response? {
                Response::Untagged(untagged) => {
                    self.client.track(std::slice::from_ref(&untagged));
                    match untagged {
                        Untagged::Exists(n) => return Ok(IdleEvent::Exists(n)),
                        Untagged::Expunge(n) => return Ok(IdleEvent::Expunge(n)),
                        Untagged::Recent(n) => return Ok(IdleEvent::Recent(n)),
                        Untagged::Fetch { seq, .. } => return Ok(IdleEvent::Fetch(seq)),
                        Untagged::Status {
                            status: Status::Bye,
                            text,
                            ..
                        } => return Err(Error::Bye(text)),
                        other => trace!(?other, "ignoring untagged data during IDLE"),
                    }
                }
                Response::Tagged {
                    tag, status, text, ..
                } if tag == self.tag => {
                    self.finished = true;
                    return match status {
                        Status::Ok => Ok(IdleEvent::Timeout),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                        Status::PreAuth => Err(Error::Protocol("PREAUTH during IDLE".to_string())),
                    };
                }
                Response::Tagged { tag, .. } => {
                    return Err(Error::Protocol(format!("unexpected tag {tag} during IDLE")));
                }
                Response::Continuation { .. } => {
                    return Err(Error::Protocol("unexpected continuation during IDLE".to_string()));
                }
            }
        }
    }

    /// Sends DONE and waits for the IDLE command to complete.
    pub async fn done(self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.client.stream.write_all(&Command::Done.serialize("")).await?;

        loop {
            match self.client.stream.next_response().await? {
                Response::Tagged { tag, status, text, .. } if tag == self.tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(()),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Untagged(untagged) => self.client.track(std::slice::from_ref(&untagged)),
                _ => {}
            }
        }
    }
}

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Enters IDLE. The server must advertise the IDLE capability.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        if !self.supports_idle() {
            return Err(Error::InvalidState("server does not support IDLE".to_string()));
        }

        let tag = self.tag_gen.next();
        self.stream.write_all(&Command::Idle.serialize(&tag)).await?;

        loop {
            match self.stream.next_response().await? {
                Response::Continuation { .. } => break,
                Response::Tagged { status, text, .. } => {
                    return Err(match status {
                        Status::No => Error::No(text),
                        Status::Bad => Error::Bad(text),
                        _ => Error::Protocol(format!("IDLE completed before it started: {text}")),
                    });
                }
                Response::Untagged(untagged) => self.track(std::slice::from_ref(&untagged)),
            }
        }

        Ok(IdleHandle {
            client: self,
            tag,
            finished: false,
        })
    }
}
