//! Operations on a selected mailbox.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::response::{HeaderFields, MessageHeaders, Untagged};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// True when the mailbox was opened with EXAMINE.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    /// Message count as last reported by the server.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.state.exists()
    }

    /// Fetches `fields` for messages `first..=last` without marking them seen.
    pub async fn fetch_headers(
        &mut self,
        first: u32,
        last: u32,
        fields: &[&str],
    ) -> Result<Vec<MessageHeaders>> {
        let command = Command::FetchHeaders {
            first,
            last,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        };
        let untagged = self.execute(command).await?;
        self.track(&untagged);

        Ok(untagged
            .into_iter()
            .filter_map(|u| match u {
                Untagged::Fetch {
                    seq,
                    literal: Some(block),
                } => Some(MessageHeaders {
                    seq,
                    fields: HeaderFields::parse(&block),
                }),
                _ => None,
            })
            .collect())
    }

    /// Closes the mailbox and returns to the authenticated state.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.execute(Command::Close).await?;
        Ok(self.transition(Authenticated))
    }

    /// Applies mailbox size updates carried by untagged data.
    pub(crate) fn track(&mut self, untagged: &[Untagged]) {
        for u in untagged {
            match u {
                Untagged::Exists(n) => self.state.exists = *n,
                Untagged::Expunge(_) => self.state.exists = self.state.exists.saturating_sub(1),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use crate::Client;

    #[tokio::test]
    async fn test_fetch_latest_headers() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] ok\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 2 EXISTS\r\n")
            .read(b"A0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 FETCH 2 (BODY.PEEK[HEADER.FIELDS (SUBJECT FROM)])\r\n")
            .read(b"* 2 FETCH (BODY[HEADER.FIELDS (SUBJECT FROM)] {42}\r\n")
            .read(b"Subject: Lunch?\r\nFrom: bob@example.com\r\n\r\n)\r\n")
            .read(b"A0003 OK FETCH completed\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        let mut inbox = client.examine("INBOX").await.unwrap();

        let headers = inbox.fetch_headers(2, 2, &["Subject", "From"]).await.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].seq, 2);
        assert_eq!(headers[0].subject(), Some("Lunch?"));
        assert_eq!(headers[0].from(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn test_close_returns_to_authenticated() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1] ok\r\n")
            .write(b"A0002 SELECT Archive\r\n")
            .read(b"* 0 EXISTS\r\n")
            .read(b"A0002 OK [READ-WRITE] done\r\n")
            .write(b"A0003 CLOSE\r\n")
            .read(b"A0003 OK closed\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        let archive = client.select("Archive").await.unwrap();
        assert!(!archive.is_read_only());
        archive.close().await.unwrap();
    }
}
