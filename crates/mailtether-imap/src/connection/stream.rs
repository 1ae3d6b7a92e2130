//! Plaintext and TLS byte streams.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A connection to the server, plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TLS over TCP (boxed to keep the enum small).
    Tls(Box<TlsStream<TcpStream>>),
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("ImapStream::Plain"),
            Self::Tls(_) => f.write_str("ImapStream::Tls"),
        }
    }
}

impl ImapStream {
    /// Opens a TCP connection as described by `config`, performing the TLS
    /// handshake for [`Security::Implicit`]. STARTTLS is negotiated later by
    /// the client, once the greeting has been read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if connecting exceeds
    /// `config.connect_timeout`, or the underlying I/O or TLS error.
    pub async fn connect(config: &Config) -> Result<Self> {
        let address = config.address();
        debug!(%address, security = ?config.security, "opening IMAP connection");

        let connect = async {
            let tcp = TcpStream::connect(&address).await?;
            match config.security {
                Security::Implicit => Self::Plain(tcp).upgrade_to_tls(&config.host).await,
                Security::StartTls | Security::None => Ok(Self::Plain(tcp)),
            }
        };

        tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout))?
    }

    /// Wraps a plaintext stream in TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the stream is already TLS, or the
    /// handshake error.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let server_name = ServerName::try_from(host.to_string())?;
                let tls = tls_connector().connect(server_name, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::InvalidState("stream is already TLS".to_string())),
        }
    }

    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// TLS connector trusting the Mozilla root set.
fn tls_connector() -> TlsConnector {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}
