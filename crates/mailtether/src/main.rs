//! `mailtether`: keeps an Outlook mailbox connected and logs new messages
//! in one folder.
//!
//! ```bash
//! export OAUTH_CLIENT_ID="your-azure-app-client-id"
//! export OAUTH_EMAIL="you@outlook.com"
//! mailtether                # first run asks for a device login
//! mailtether generate-key   # prints a key for MAILTETHER_TOKEN_KEY
//! ```

mod settings;

use std::sync::Arc;

use anyhow::{Context, Result};
use mailtether_core::{
    CredentialConnector, FolderWatcher, ImapMailSession, ManagerConfig, SessionManager,
};
use mailtether_oauth::{
    CredentialProvider, EncryptedTokenStorage, FileTokenStorage, OAuthClient,
    OAuthCredentialProvider, Provider, TokenStorage,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::{Settings, TOKEN_KEY_ENV};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailtether=info,mailtether_core=info,mailtether_imap=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if std::env::args().nth(1).as_deref() == Some("generate-key") {
        println!("{}", EncryptedTokenStorage::<FileTokenStorage>::generate_key());
        return Ok(());
    }

    let settings = Settings::from_env()?;
    info!(email = %settings.email, folder = %settings.folder, "starting mailtether");

    let client = OAuthClient::new(&settings.client_id, Provider::microsoft_consumers()?);
    let credentials =
        OAuthCredentialProvider::new(client, &settings.email, token_storage(&settings)?);

    if !credentials.has_cached_credential().await {
        credentials
            .device_login(|prompt| {
                println!("To sign in, open {} and enter the code {}", prompt.uri, prompt.code);
                println!("(the code expires in {} seconds)", prompt.expires_in);
            })
            .await
            .context("device login failed")?;
    }

    let manager = SessionManager::start(ManagerConfig::from_env()?);
    let session = Arc::new(ImapMailSession::outlook(&settings.email));
    let managed = manager
        .manage(session, CredentialConnector::new(credentials))
        .await;
    if let Some(e) = managed.initial_connection().error() {
        warn!(error = %e, "initial connection failed, retrying in the background");
    }

    let watcher = FolderWatcher::attach(&managed, &settings.folder, |message| {
        info!(
            folder = %message.folder,
            seq = message.seq,
            subject = message.subject.as_deref().unwrap_or("(no subject)"),
            from = message.from.as_deref().unwrap_or("(unknown sender)"),
            "new message"
        );
    })
    .await;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    watcher.detach();
    manager.stop(true).await;
    Ok(())
}

fn token_storage(settings: &Settings) -> Result<Box<dyn TokenStorage>> {
    let file = FileTokenStorage::new(&settings.token_file, &settings.email);
    match &settings.token_key {
        Some(key) => {
            let encrypted = EncryptedTokenStorage::new(file, key)
                .with_context(|| format!("{TOKEN_KEY_ENV} is not a valid key"))?;
            Ok(Box::new(encrypted))
        }
        None => Ok(Box::new(file)),
    }
}
