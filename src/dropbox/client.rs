use super::{ClientFactory, StorageClient};
use crate::credentials::{AppCredentials, OAuthToken};
use crate::oauth::{ProviderConfig, Signer};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;

const USER_AGENT: &str = "formdrop/0.1";

/// Metadata returned by `files_put`.
#[derive(Debug, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub rev: Option<String>,
}

/// Public link returned by `shares`.
#[derive(Debug, Deserialize)]
pub struct ShareLink {
    pub url: String,
    #[serde(default)]
    pub expires: Option<String>,
}

/// Dropbox reports `uid` as a number; accept strings too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Uid {
    Number(u64),
    Text(String),
}

/// Subset of `account/info`.
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    uid: Uid,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AccountInfo {
    pub fn account_id(&self) -> String {
        match &self.uid {
            Uid::Number(n) => n.to_string(),
            Uid::Text(s) => s.clone(),
        }
    }
}

/// HTTP client for the Dropbox v1 API, signing every request with OAuth 1.0a.
pub struct DropboxClient {
    http_client: Client,
    provider: ProviderConfig,
    credentials: AppCredentials,
    token: OAuthToken,
}

impl DropboxClient {
    pub fn new(
        http_client: Client,
        provider: ProviderConfig,
        credentials: AppCredentials,
        token: OAuthToken,
    ) -> Self {
        Self {
            http_client,
            provider,
            credentials,
            token,
        }
    }

    fn authorization(&self, method: &str, url: &str) -> String {
        Signer::new(&self.credentials, Some(&self.token)).authorization_header(method, url, &[])
    }
}

#[async_trait]
impl StorageClient for DropboxClient {
    async fn upload(&self, remote_path: &str, local_path: &Path) -> Result<FileMetadata> {
        let body = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read local file {}", local_path.display()))?;

        let url = self.provider.files_put_url(remote_path);
        tracing::debug!(remote_path = %remote_path, bytes = body.len(), "Uploading file");

        let response = self
            .http_client
            .put(&url)
            .header(AUTHORIZATION, self.authorization("PUT", &url))
            .body(body)
            .send()
            .await
            .context("Failed to send files_put request")?;

        check_response_status(&response)?;
        let metadata = response
            .json::<FileMetadata>()
            .await
            .context("Failed to parse files_put response")?;

        tracing::debug!(
            path = %metadata.path,
            bytes = ?metadata.bytes,
            rev = ?metadata.rev,
            "File stored"
        );
        Ok(metadata)
    }

    async fn share(&self, remote_path: &str) -> Result<ShareLink> {
        let url = self.provider.shares_url(remote_path);
        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, self.authorization("POST", &url))
            .send()
            .await
            .context("Failed to send shares request")?;

        check_response_status(&response)?;
        let link = response
            .json::<ShareLink>()
            .await
            .context("Failed to parse shares response")?;

        tracing::debug!(remote_path = %remote_path, expires = ?link.expires, "Share link created");
        Ok(link)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        let url = self.provider.account_info_url();
        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, self.authorization("GET", &url))
            .send()
            .await
            .context("Failed to send account_info request")?;

        check_response_status(&response)?;
        response
            .json::<AccountInfo>()
            .await
            .context("Failed to parse account_info response")
    }
}

/// Builds [`DropboxClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct DropboxClientFactory {
    http_client: Client,
    provider: ProviderConfig,
}

impl DropboxClientFactory {
    pub fn new(provider: ProviderConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client()?,
            provider,
        })
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }
}

impl ClientFactory for DropboxClientFactory {
    fn connect(
        &self,
        credentials: &AppCredentials,
        token: &OAuthToken,
    ) -> Result<Box<dyn StorageClient>> {
        Ok(Box::new(DropboxClient::new(
            self.http_client.clone(),
            self.provider.clone(),
            credentials.clone(),
            token.clone(),
        )))
    }
}

pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Maps Dropbox error statuses to descriptive errors.
///
/// - 401 → auth error (token revoked or invalid)
/// - 429/503 → rate limited
/// - 507 → quota exceeded
/// - Other non-2xx → generic API error
pub(crate) fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Dropbox auth error: token revoked or invalid")),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            Err(anyhow!("Dropbox rate limit exceeded ({})", response.status()))
        }
        StatusCode::INSUFFICIENT_STORAGE => Err(anyhow!("Dropbox storage quota exceeded")),
        s if !s.is_success() => Err(anyhow!("Dropbox API error: {}", s)),
        _ => Ok(()),
    }
}
