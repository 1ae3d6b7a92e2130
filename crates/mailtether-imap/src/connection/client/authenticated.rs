//! Mailbox selection.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::response::Untagged;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens `mailbox` read-write.
    pub async fn select(self, mailbox: &str) -> Result<Client<S, Selected>> {
        self.open(mailbox, false).await
    }

    /// Opens `mailbox` read-only. Folder watches use this so that
    /// fetching headers never changes message state.
    pub async fn examine(self, mailbox: &str) -> Result<Client<S, Selected>> {
        self.open(mailbox, true).await
    }

    async fn open(mut self, mailbox: &str, read_only: bool) -> Result<Client<S, Selected>> {
        let command = if read_only {
            Command::Examine {
                mailbox: mailbox.to_string(),
            }
        } else {
            Command::Select {
                mailbox: mailbox.to_string(),
            }
        };
        let untagged = self.execute(command).await?;
        let exists = untagged
            .iter()
            .rev()
            .find_map(|u| match u {
                Untagged::Exists(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(0);

        Ok(self.transition(Selected {
            mailbox: mailbox.to_string(),
            read_only,
            exists,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use crate::{Client, Error};

    #[tokio::test]
    async fn test_examine_reads_exists() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] ok\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* FLAGS (\\Seen \\Answered)\r\n")
            .read(b"* 172 EXISTS\r\n")
            .read(b"* 1 RECENT\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"A0002 OK [READ-ONLY] EXAMINE completed\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        let inbox = client.examine("INBOX").await.unwrap();
        assert_eq!(inbox.exists(), 172);
        assert_eq!(inbox.mailbox(), "INBOX");
        assert!(inbox.is_read_only());
    }

    #[tokio::test]
    async fn test_select_missing_mailbox() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1] ok\r\n")
            .write(b"A0002 SELECT Nope\r\n")
            .read(b"A0002 NO [NONEXISTENT] Unknown Mailbox\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        let err = client.select("Nope").await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
    }
}
