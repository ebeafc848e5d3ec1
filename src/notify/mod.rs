//! Out-of-band admin notifications.
//!
//! Failed uploads are reported once per submission. Delivery goes through a mail
//! relay webhook when one is configured; otherwise the notice is logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A message for the site administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<()>;
}

/// `[notifications]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// Mail relay endpoint accepting `{to, from, subject, body}` JSON
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub admin_email: String,
    #[serde(default = "default_from")]
    pub from: String,
}

fn default_from() -> String {
    "no-reply@localhost".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            admin_email: String::new(),
            from: default_from(),
        }
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts notices to a mail relay.
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    to: String,
    from: String,
}

impl WebhookNotifier {
    pub fn new(http_client: Client, url: String, to: String, from: String) -> Self {
        Self {
            http_client,
            url,
            to,
            from,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &Notice) -> Result<()> {
        let message = RelayMessage {
            to: &self.to,
            from: &self.from,
            subject: &notice.subject,
            body: &notice.body,
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("Failed to send notification")?;

        response
            .error_for_status()
            .context("Mail relay rejected notification")?;

        tracing::debug!(to = %self.to, subject = %notice.subject, "Notification sent");
        Ok(())
    }
}

/// Writes notices to the log at `error` level.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> Result<()> {
        tracing::error!(subject = %notice.subject, body = %notice.body, "Admin notification");
        Ok(())
    }
}

/// Picks the webhook notifier when a relay URL is configured.
pub fn from_config(config: &NotificationConfig, http_client: Client) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) if !url.is_empty() => Arc::new(WebhookNotifier::new(
            http_client,
            url.clone(),
            config.admin_email.clone(),
            config.from.clone(),
        )),
        _ => Arc::new(LogNotifier),
    }
}
