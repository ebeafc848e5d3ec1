//! Persisted authorization state machine.
//!
//! ```text
//! unset --start--> awaiting_redirect --callback--> awaiting_exchange --exchange--> unset
//!                                                          |                  (access token stored)
//!                                                          +--error--> unset (nothing stored)
//! ```

use super::{AuthError, OAuthSession, ProviderConfig};
use crate::credentials::{AppCredentials, AuthState, CredentialStore};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

/// Query parameters the provider appends when redirecting back.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Callback {
    #[serde(default)]
    pub oauth_token: Option<String>,
    /// Set by the provider when the user clicks "Deny"
    #[serde(default)]
    pub not_approved: Option<String>,
}

impl Callback {
    fn declined(&self) -> bool {
        self.not_approved
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }
}

/// Drives the authorization legs against the credential store.
#[derive(Clone)]
pub struct AuthFlow {
    store: CredentialStore,
    http_client: Client,
    provider: ProviderConfig,
}

impl AuthFlow {
    pub fn new(store: CredentialStore, http_client: Client, provider: ProviderConfig) -> Self {
        Self {
            store,
            http_client,
            provider,
        }
    }

    /// Leg 1: obtains a request token, persists it and returns the authorize URL.
    ///
    /// A previously stored access token is dropped: the account must be
    /// re-authorized before uploads resume.
    pub async fn start(&self, return_url: &str) -> Result<String, AuthError> {
        let session = self.session()?;
        let (temp_token, authorize_url) = session.begin(return_url).await?;

        let replaced = self
            .store
            .delete_access_token()
            .map_err(AuthError::storage)?;
        if replaced {
            info!("Dropped previous access token for re-authorization");
        }
        self.store
            .store_temp_token(&temp_token)
            .map_err(AuthError::storage)?;
        self.store
            .set_auth_state(AuthState::AwaitingRedirect)
            .map_err(AuthError::storage)?;

        info!("Authorization started, awaiting redirect");
        Ok(authorize_url)
    }

    /// Leg 2: exchanges the pending request token and verifies the result.
    ///
    /// Returns the provider account id. On any failure the flow is reset and no
    /// access token remains stored.
    pub async fn finish(&self, callback: &Callback) -> Result<String, AuthError> {
        let result = self.exchange(callback).await;
        if let Err(e) = &result {
            warn!(error = %e, "Authorization failed, resetting flow");
            self.reset();
        }
        result
    }

    /// Removes the access token and any pending authorization.
    pub fn deauthorize(&self) -> Result<bool, AuthError> {
        let removed = self
            .store
            .delete_access_token()
            .map_err(AuthError::storage)?;
        self.reset();
        info!(removed, "Dropbox account deauthorized");
        Ok(removed)
    }

    pub fn state(&self) -> Result<AuthState, AuthError> {
        self.store.auth_state().map_err(AuthError::storage)
    }

    async fn exchange(&self, callback: &Callback) -> Result<String, AuthError> {
        if self.state()? == AuthState::Unset {
            return Err(AuthError::NotStarted);
        }
        let temp_token = self
            .store
            .temp_token()
            .map_err(AuthError::storage)?
            .ok_or(AuthError::NotStarted)?;

        if callback.declined() {
            return Err(AuthError::Denied);
        }
        if let Some(returned) = callback.oauth_token.as_deref() {
            if returned != temp_token.key {
                return Err(AuthError::TokenMismatch);
            }
        }

        self.store
            .set_auth_state(AuthState::AwaitingExchange)
            .map_err(AuthError::storage)?;

        let session = self.session()?;
        let access_token = session.complete(&temp_token).await?;
        let account_id = session.verify(&access_token).await?;

        self.store
            .store_access_token(&access_token)
            .map_err(AuthError::storage)?;
        self.store
            .set_auth_state(AuthState::Unset)
            .map_err(AuthError::storage)?;

        info!(account_id = %account_id, "Dropbox account connected");
        Ok(account_id)
    }

    fn session(&self) -> Result<OAuthSession, AuthError> {
        let credentials: AppCredentials = self
            .store
            .app_credentials()
            .map_err(AuthError::storage)?
            .ok_or(AuthError::NotConfigured)?;

        Ok(OAuthSession::new(
            self.http_client.clone(),
            self.provider.clone(),
            credentials,
        ))
    }

    /// Best effort: a store failure here is logged, the original error wins.
    fn reset(&self) {
        if let Err(e) = self.store.delete_temp_token() {
            warn!(error = %e, "Failed to delete temporary token");
        }
        if let Err(e) = self.store.set_auth_state(AuthState::Unset) {
            warn!(error = %e, "Failed to reset auth state");
        }
    }
}
