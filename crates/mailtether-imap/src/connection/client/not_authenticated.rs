//! Greeting, STARTTLS and authentication.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::config::{Config, Security};
use crate::connection::framed::FramedStream;
use crate::connection::stream::ImapStream;
use crate::response::{Response, Status, Untagged};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] if the server refuses the connection, or
    /// [`Error::Protocol`] for anything other than an OK/PREAUTH greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.next_response().await?;

        let capabilities = greeting.capabilities().unwrap_or_default();
        match greeting {
            Response::Untagged(Untagged::Status {
                status: Status::Ok | Status::PreAuth,
                ..
            }) => {}
            Response::Untagged(Untagged::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            io_timeout: None,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn login(self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        if self.has_capability("LOGINDISABLED") {
            return Err(Error::Auth("server has disabled LOGIN".to_string()));
        }
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.authenticate_with(command).await
    }

    /// Authenticates with SASL XOAUTH2 using an OAuth2 access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the token.
    pub async fn authenticate_xoauth2(
        self,
        email: &str,
        access_token: &str,
    ) -> Result<Client<S, Authenticated>> {
        let command = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some(mailtether_oauth::sasl::xoauth2_response(email, access_token)),
        };
        self.authenticate_with(command).await
    }

    async fn authenticate_with(mut self, command: Command) -> Result<Client<S, Authenticated>> {
        let name = command.name();
        // pre-login capabilities are stale once authenticated
        self.capabilities.clear();
        self.execute(command).await.map_err(|e| match e {
            Error::No(text) | Error::Bad(text) => Error::Auth(text),
            other => other,
        })?;
        debug!(command = name, "authenticated");

        if self.capabilities.is_empty() {
            self.execute(Command::Capability).await?;
        }
        Ok(self.transition(Authenticated))
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Connects as described by `config`, reads the greeting and negotiates
    /// STARTTLS when requested.
    ///
    /// # Errors
    ///
    /// Returns connection, TLS, or greeting errors.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = ImapStream::connect(config).await?;
        let client = Self::from_stream(stream)
            .await?
            .with_io_timeout(config.io_timeout);
        match config.security {
            Security::StartTls => client.starttls(&config.host).await,
            Security::Implicit | Security::None => Ok(client),
        }
    }

    /// Upgrades the connection with STARTTLS and re-reads capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses STARTTLS or the handshake fails.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.execute(Command::StartTls).await?;
        let io_timeout = self.io_timeout;
        let tag_gen = self.tag_gen;
        let stream = self.stream.into_inner().upgrade_to_tls(host).await?;

        // capabilities from before the upgrade must be discarded
        let mut client = Self {
            stream: FramedStream::new(stream),
            tag_gen,
            capabilities: Vec::new(),
            io_timeout,
            state: NotAuthenticated,
        };
        client.execute(Command::Capability).await?;
        Ok(client)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_greeting_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=XOAUTH2 IDLE] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.supports_idle());
        assert!(client.has_capability("AUTH=XOAUTH2"));
    }

    #[tokio::test]
    async fn test_greeting_bye() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_with_capabilities_in_ok() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user secret\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] Logged in\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "secret").await.unwrap();
        assert!(client.supports_idle());
    }

    #[tokio::test]
    async fn test_login_refreshes_capabilities() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user secret\r\n")
            .read(b"A0001 OK Logged in\r\n")
            .write(b"A0002 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 IDLE\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "secret").await.unwrap();
        assert!(client.supports_idle());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_login_disabled() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(matches!(
            client.login("user", "secret").await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_xoauth2_error_challenge() {
        let initial = mailtether_oauth::sasl::xoauth2_response("user@outlook.com", "expired");
        let command = format!("A0001 AUTHENTICATE XOAUTH2 {initial}\r\n");
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=XOAUTH2] ready\r\n")
            .write(command.as_bytes())
            .read(b"+ eyJzdGF0dXMiOiI0MDEifQ==\r\n")
            .write(b"\r\n")
            .read(b"A0001 NO AUTHENTICATE failed.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client
            .authenticate_xoauth2("user@outlook.com", "expired")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text == "AUTHENTICATE failed."));
    }
}
