use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use common::{AlertPayload, Error, Notifier, Result};

use crate::format_alert;

/// Posts alerts to a Discord-compatible webhook as `{"content": "..."}`.
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    async fn post(&self, content: &str) -> Result<()> {
        let body = json!({ "content": content });
        self.http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| Error::Notification(format!("webhook: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, payload: &AlertPayload) -> Result<()> {
        self.post(&format_alert(payload)).await?;
        info!(strategy = %payload.strategy_name, "Webhook alert sent");
        Ok(())
    }

    async fn notice(&self, text: &str) -> Result<()> {
        self.post(text).await
    }
}
