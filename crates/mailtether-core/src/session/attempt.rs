//! Connection attempts: "get credentials, then (re)connect the transport".

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mailtether_oauth::CredentialProvider;
use tracing::{debug, warn};

use super::{AuthMethod, ConnectionOutcome, MailTransport};
use crate::error::Error;

/// One bounded unit of work that (re)connects a transport.
///
/// Called once by [`SessionManager::manage`](super::SessionManager::manage)
/// and again by every sweep that finds the transport disconnected, so it must
/// be safe to call repeatedly. Failures are returned as
/// [`ConnectionOutcome::Failed`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects `session`.
    async fn connect(&self, session: Arc<dyn MailTransport>) -> ConnectionOutcome;
}

#[async_trait]
impl<F, Fut> Connector for F
where
    F: Fn(Arc<dyn MailTransport>) -> Fut + Send + Sync,
    Fut: Future<Output = ConnectionOutcome> + Send,
{
    async fn connect(&self, session: Arc<dyn MailTransport>) -> ConnectionOutcome {
        (self)(session).await
    }
}

/// Connector that logs in through a [`CredentialProvider`] and hands the
/// resulting token to the transport.
#[derive(Debug)]
pub struct CredentialConnector<P> {
    provider: P,
    method: AuthMethod,
}

impl<P: CredentialProvider> CredentialConnector<P> {
    /// XOAUTH2 connector.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            method: AuthMethod::OAuth2,
        }
    }

    /// Overrides the authentication method.
    #[must_use]
    pub const fn with_method(mut self, method: AuthMethod) -> Self {
        self.method = method;
        self
    }

    /// The credential provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: CredentialProvider> Connector for CredentialConnector<P> {
    async fn connect(&self, session: Arc<dyn MailTransport>) -> ConnectionOutcome {
        let credentials = match self.provider.login().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(session = session.id(), error = %e, "credential login failed");
                return ConnectionOutcome::failed(Error::OAuth(e));
            }
        };

        debug!(
            session = session.id(),
            username = %credentials.username,
            method = %self.method,
            "connecting"
        );
        session
            .connect(self.method, &credentials.username, &credentials.access_token)
            .await
    }
}
