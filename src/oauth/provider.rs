//! Storage provider endpoints.
//!
//! Defaults point at the Dropbox v1 API. Base URLs are configurable so tests can
//! aim the client at a mock server.

use serde::{Deserialize, Serialize};

/// Dropbox endpoint configuration (`[dropbox]` section).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API host (OAuth token endpoints, account info, shares)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Content host (file uploads)
    #[serde(default = "default_content_url")]
    pub content_url: String,

    /// Web host (user-facing authorize page)
    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Access root: `sandbox` for app-folder apps, `dropbox` for full access
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_api_url() -> String {
    "https://api.dropbox.com".to_string()
}

fn default_content_url() -> String {
    "https://api-content.dropbox.com".to_string()
}

fn default_web_url() -> String {
    "https://www.dropbox.com".to_string()
}

fn default_root() -> String {
    "sandbox".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            content_url: default_content_url(),
            web_url: default_web_url(),
            root: default_root(),
        }
    }
}

impl ProviderConfig {
    /// Same endpoints on a single host (mock servers).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_url: base_url.to_string(),
            content_url: base_url.to_string(),
            web_url: base_url.to_string(),
            root: default_root(),
        }
    }

    pub fn request_token_url(&self) -> String {
        format!("{}/1/oauth/request_token", self.api_url)
    }

    pub fn access_token_url(&self) -> String {
        format!("{}/1/oauth/access_token", self.api_url)
    }

    pub fn account_info_url(&self) -> String {
        format!("{}/1/account/info", self.api_url)
    }

    /// Authorize page the user's browser is sent to.
    pub fn authorize_url(&self, request_token: &str, callback_url: &str) -> String {
        format!(
            "{}/1/oauth/authorize?oauth_token={}&oauth_callback={}",
            self.web_url,
            urlencoding::encode(request_token),
            urlencoding::encode(callback_url)
        )
    }

    pub fn files_put_url(&self, path: &str) -> String {
        format!(
            "{}/1/files_put/{}/{}",
            self.content_url,
            self.root,
            encode_path(path)
        )
    }

    pub fn shares_url(&self, path: &str) -> String {
        format!("{}/1/shares/{}/{}", self.api_url, self.root, encode_path(path))
    }
}

/// Percent-encodes each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
