use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use vault_core::error::DomainError;
use vault_core::gateways::Notifier;
use vault_shared::config::NotificationSettings;

use super::build_client;

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    recipient: &'a str,
    text: &'a str,
}

/// Messaging gateway client: `POST {gateway_url}/messages`.
pub struct HttpNotifier {
    client: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `None` when no gateway is configured.
    pub fn from_settings(settings: &NotificationSettings) -> Result<Option<Self>, DomainError> {
        settings
            .gateway_url
            .as_deref()
            .map(|url| Self::new(url, settings.timeout_secs))
            .transpose()
    }

    async fn post(&self, recipient: &str, text: &str) -> anyhow::Result<()> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&MessageRequest { recipient, text })
            .send()
            .await
            .with_context(|| format!("failed to reach messaging gateway at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("messaging gateway returned {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), DomainError> {
        debug!(recipient, "Sending operator message");
        self.post(recipient, text).await.map_err(|e| {
            warn!("Messaging gateway call failed: {:#}", e);
            DomainError::GatewayError(format!("{:#}", e))
        })
    }
}
