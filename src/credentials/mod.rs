//! Credential store for the Dropbox app, its OAuth tokens and upload settings.
//!
//! Everything the upload pipeline and the authorization flow persist lives in a
//! single [`OptionStore`]. [`CredentialStore`] is the typed view over it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - typed credentials / tokens / state    │
//! └─────────────────────────────────────────┘
//!                    ↓ ↑
//! ┌─────────────────────────────────────────┐
//! │       OptionStore (trait)                │
//! │  - SqliteOptionStore (sealed secrets)    │
//! │  - MemoryOptionStore                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - At most one of the temporary token and the access token is meaningful at a
//!   time: storing an access token removes the temporary token.
//! - Secret-bearing options are sealed at rest by the SQLite store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

mod encryption;
mod options;
mod storage;

pub use encryption::Cipher;
pub use options::{MemoryOptionStore, OptionKey, OptionStore};
pub use storage::SqliteOptionStore;

/// Dropbox app key and secret, configured once by an administrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_key: String,
    pub app_secret: String,
}

/// OAuth 1.0a token pair (temporary request token or access token).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub key: String,
    pub secret: String,
}

/// Where the authorization flow left off.
///
/// Persisted because the two legs of the flow run in separate requests with a
/// browser redirect in between.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unset,
    AwaitingRedirect,
    AwaitingExchange,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unset => "",
            AuthState::AwaitingRedirect => "awaiting_redirect",
            AuthState::AwaitingExchange => "awaiting_exchange",
        }
    }

    /// Unknown markers are treated as `Unset` so a corrupt value restarts the flow.
    pub fn parse(value: &str) -> Self {
        match value {
            "awaiting_redirect" => AuthState::AwaitingRedirect,
            "awaiting_exchange" => AuthState::AwaitingExchange,
            "" => AuthState::Unset,
            other => {
                warn!(state = %other, "Unknown auth state marker, treating as unset");
                AuthState::Unset
            }
        }
    }
}

/// Global upload settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Default destination directory template (may contain macros).
    pub directory: String,
    /// Replace local files with Dropbox share links after upload.
    pub remove_after_upload: bool,
}

/// Typed access to the persisted options.
#[derive(Clone)]
pub struct CredentialStore {
    options: Arc<dyn OptionStore>,
}

impl CredentialStore {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }

    /// Returns the app credentials, or `None` if either half is missing or blank.
    pub fn app_credentials(&self) -> Result<Option<AppCredentials>> {
        let app_key = self.non_empty(OptionKey::AppKey)?;
        let app_secret = self.non_empty(OptionKey::AppSecret)?;

        Ok(match (app_key, app_secret) {
            (Some(app_key), Some(app_secret)) => Some(AppCredentials {
                app_key,
                app_secret,
            }),
            _ => None,
        })
    }

    /// Raw app key, even when the secret is still missing (settings view).
    pub fn app_key(&self) -> Result<Option<String>> {
        self.non_empty(OptionKey::AppKey)
    }

    pub fn has_app_secret(&self) -> Result<bool> {
        Ok(self.non_empty(OptionKey::AppSecret)?.is_some())
    }

    pub fn save_app_credentials(&self, app_key: &str, app_secret: &str) -> Result<()> {
        self.save_app_key(app_key)?;
        self.save_app_secret(app_secret)
    }

    pub fn save_app_key(&self, app_key: &str) -> Result<()> {
        self.options.set_option(OptionKey::AppKey, app_key)
    }

    pub fn save_app_secret(&self, app_secret: &str) -> Result<()> {
        self.options.set_option(OptionKey::AppSecret, app_secret)
    }

    pub fn upload_settings(&self) -> Result<UploadSettings> {
        let directory = self
            .options
            .get_option(OptionKey::UploadDirectory)?
            .unwrap_or_default();
        let remove_after_upload = self
            .options
            .get_option(OptionKey::RemoveAfterUpload)?
            .is_some_and(|v| v.trim() == "1");

        Ok(UploadSettings {
            directory,
            remove_after_upload,
        })
    }

    pub fn save_upload_settings(&self, settings: &UploadSettings) -> Result<()> {
        self.options
            .set_option(OptionKey::UploadDirectory, &settings.directory)?;
        self.options.set_option(
            OptionKey::RemoveAfterUpload,
            if settings.remove_after_upload { "1" } else { "0" },
        )
    }

    pub fn access_token(&self) -> Result<Option<OAuthToken>> {
        self.token(OptionKey::AccessToken)
    }

    /// Persists the access token and drops the superseded temporary token.
    pub fn store_access_token(&self, token: &OAuthToken) -> Result<()> {
        self.store_token(OptionKey::AccessToken, token)?;
        self.options.delete_option(OptionKey::TempToken)?;
        Ok(())
    }

    pub fn delete_access_token(&self) -> Result<bool> {
        self.options.delete_option(OptionKey::AccessToken)
    }

    pub fn temp_token(&self) -> Result<Option<OAuthToken>> {
        self.token(OptionKey::TempToken)
    }

    pub fn store_temp_token(&self, token: &OAuthToken) -> Result<()> {
        self.store_token(OptionKey::TempToken, token)
    }

    pub fn delete_temp_token(&self) -> Result<bool> {
        self.options.delete_option(OptionKey::TempToken)
    }

    pub fn auth_state(&self) -> Result<AuthState> {
        Ok(self
            .options
            .get_option(OptionKey::AuthState)?
            .map(|v| AuthState::parse(&v))
            .unwrap_or_default())
    }

    /// `Unset` removes the marker instead of storing an empty value.
    pub fn set_auth_state(&self, state: AuthState) -> Result<()> {
        match state {
            AuthState::Unset => {
                self.options.delete_option(OptionKey::AuthState)?;
                Ok(())
            }
            other => self.options.set_option(OptionKey::AuthState, other.as_str()),
        }
    }

    fn non_empty(&self, key: OptionKey) -> Result<Option<String>> {
        Ok(self
            .options
            .get_option(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn token(&self, key: OptionKey) -> Result<Option<OAuthToken>> {
        let Some(raw) = self.non_empty(key)? else {
            return Ok(None);
        };
        let token: OAuthToken = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse stored token {}", key))?;
        if token.key.is_empty() || token.secret.is_empty() {
            return Ok(None);
        }
        Ok(Some(token))
    }

    fn store_token(&self, key: OptionKey, token: &OAuthToken) -> Result<()> {
        let raw = serde_json::to_string(token).context("Failed to serialize token")?;
        self.options.set_option(key, &raw)
    }
}
