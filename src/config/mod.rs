use crate::notify::NotificationConfig;
use crate::oauth::ProviderConfig;
use crate::upload::LocalPathResolver;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete formdrop configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormdropConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dropbox: ProviderConfig,
    #[serde(default)]
    pub uploads: LocalPathResolver,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Log swallowed share/cleanup failures at `warn`
    #[serde(default)]
    pub debug: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Externally reachable base URL, used to build the OAuth callback
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Admin settings page the OAuth callback redirects back to
    #[serde(default = "default_settings_url")]
    pub settings_url: String,
    /// Bearer token required on admin endpoints; open when unset
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_settings_url() -> String {
    "http://localhost:3000/settings".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            settings_url: default_settings_url(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    pub fn callback_url(&self) -> String {
        format!("{}/api/oauth/callback", self.public_url.trim_end_matches('/'))
    }
}

/// Option store location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "formdrop.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl FormdropConfig {
    /// Applies `FORMDROP_*` overrides from the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("FORMDROP_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(db) = lookup("FORMDROP_DB") {
            self.storage.db_path = db;
        }
        if let Some(token) = lookup("FORMDROP_ADMIN_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.server.admin_token = Some(token.trim().to_string());
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<FormdropConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: FormdropConfig =
        toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path))?;
    Ok(config)
}

/// Loads `FORMDROP_CONFIG` when set (defaults otherwise), then env overrides.
pub fn load_from_env() -> Result<FormdropConfig> {
    let mut config = match std::env::var("FORMDROP_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => FormdropConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}
