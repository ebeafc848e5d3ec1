//! Storage provider client.
//!
//! The dispatcher talks to Dropbox through [`StorageClient`]; a fresh client is
//! built for every dispatch by a [`ClientFactory`], bound to the credentials and
//! access token read at that moment.

mod client;

pub use client::{AccountInfo, DropboxClient, DropboxClientFactory, FileMetadata, ShareLink};

use crate::credentials::{AppCredentials, OAuthToken};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Authenticated operations the upload pipeline needs.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Uploads the local file at `local_path` to `remote_path`, overwriting.
    async fn upload(&self, remote_path: &str, local_path: &Path) -> Result<FileMetadata>;

    /// Creates a public share link for an uploaded file.
    async fn share(&self, remote_path: &str) -> Result<ShareLink>;

    /// Fetches the account the token belongs to.
    async fn account_info(&self) -> Result<AccountInfo>;
}

/// Builds a client scoped to one invocation.
pub trait ClientFactory: Send + Sync {
    fn connect(
        &self,
        credentials: &AppCredentials,
        token: &OAuthToken,
    ) -> Result<Box<dyn StorageClient>>;
}
