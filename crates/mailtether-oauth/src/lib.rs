//! # mailtether-oauth
//!
//! `OAuth2` credentials for long-lived mail sessions.
//!
//! ## Features
//!
//! - **Device flow** (RFC 8628) for interactive first login from a terminal
//! - **Silent login** from a persisted token, refreshing it when expired
//! - **Token persistence**: JSON file, system keyring, AES-256-GCM encryption
//!   decorator and an in-memory store
//! - **Provider presets** for Google and Microsoft (work/school and personal
//!   accounts)
//! - **SASL strings**: XOAUTH2 and OAUTHBEARER (RFC 7628)
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtether_oauth::{
//!     CredentialProvider, FileTokenStorage, OAuthClient, OAuthCredentialProvider, Provider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> mailtether_oauth::Result<()> {
//!     let client = OAuthClient::new("client-id", Provider::microsoft_consumers()?);
//!     let storage = FileTokenStorage::new("oauth2_tokens.json", "user@outlook.com");
//!     let provider = OAuthCredentialProvider::new(client, "user@outlook.com", storage);
//!
//!     if !provider.has_cached_credential().await {
//!         provider
//!             .device_login(|prompt| {
//!                 println!("Visit {} and enter {}", prompt.uri, prompt.code);
//!             })
//!             .await?;
//!     }
//!
//!     let credentials = provider.login().await?;
//!     println!("token for {}", credentials.username);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod credential;
mod error;
pub mod flow;
pub mod provider;
pub mod sasl;
pub mod storage;
pub mod token;

pub use credential::{CredentialProvider, Credentials, OAuthCredentialProvider, VerificationPrompt};
pub use error::{Error, Result};
pub use flow::{DeviceAuthorization, DeviceFlow, OAuthClient};
pub use provider::Provider;
pub use storage::{
    EncryptedTokenStorage, FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage,
    TokenStorage,
};
pub use token::Token;
