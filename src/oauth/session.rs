//! The three provider calls of the OAuth 1.0a dance, plus token verification.

use super::{AuthError, ProviderConfig, Signer};
use crate::credentials::{AppCredentials, OAuthToken};
use crate::dropbox::{DropboxClient, StorageClient};
use reqwest::{header::AUTHORIZATION, Client};
use serde::Deserialize;

/// Token endpoint response (`application/x-www-form-urlencoded`).
#[derive(Deserialize, Debug)]
struct TokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
}

/// OAuth session for one app. Holds no tokens of its own.
pub struct OAuthSession {
    http_client: Client,
    provider: ProviderConfig,
    credentials: AppCredentials,
}

impl OAuthSession {
    pub fn new(http_client: Client, provider: ProviderConfig, credentials: AppCredentials) -> Self {
        Self {
            http_client,
            provider,
            credentials,
        }
    }

    /// Obtains a request token and the authorize URL the user must visit.
    ///
    /// `return_url` is where the provider sends the browser afterwards.
    pub async fn begin(&self, return_url: &str) -> Result<(OAuthToken, String), AuthError> {
        let token = self
            .token_request(&self.provider.request_token_url(), None)
            .await?;
        let authorize_url = self.provider.authorize_url(&token.key, return_url);

        tracing::debug!("Request token obtained");
        Ok((token, authorize_url))
    }

    /// Exchanges an authorized request token for an access token.
    pub async fn complete(&self, temp_token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let token = self
            .token_request(&self.provider.access_token_url(), Some(temp_token))
            .await?;

        tracing::debug!("Access token obtained");
        Ok(token)
    }

    /// Confirms the access token works; returns the provider account id.
    pub async fn verify(&self, access_token: &OAuthToken) -> Result<String, AuthError> {
        let client = DropboxClient::new(
            self.http_client.clone(),
            self.provider.clone(),
            self.credentials.clone(),
            access_token.clone(),
        );

        let info = client
            .account_info()
            .await
            .map_err(|e| AuthError::Rejected(format!("{:#}", e)))?;

        let account_id = info.account_id();
        tracing::info!(
            account_id = %account_id,
            display_name = info.display_name.as_deref().unwrap_or(""),
            "Access token verified"
        );
        Ok(account_id)
    }

    async fn token_request(
        &self,
        url: &str,
        token: Option<&OAuthToken>,
    ) -> Result<OAuthToken, AuthError> {
        let authorization =
            Signer::new(&self.credentials, token).authorization_header("POST", url, &[]);

        let response = self
            .http_client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Token request rejected");
            return Err(AuthError::Rejected(format!("{}: {}", status, body.trim())));
        }

        let parsed: TokenResponse = serde_urlencoded::from_str(body.trim())
            .map_err(|e| AuthError::Network(format!("Malformed token response: {}", e)))?;

        Ok(OAuthToken {
            key: parsed.oauth_token,
            secret: parsed.oauth_token_secret,
        })
    }
}
