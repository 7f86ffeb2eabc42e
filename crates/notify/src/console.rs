use async_trait::async_trait;
use tracing::info;

use common::{AlertPayload, Notifier, Result};

/// Fallback sink when no webhook or Telegram chat is configured.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, payload: &AlertPayload) -> Result<()> {
        let json = serde_json::to_string_pretty(payload)?;
        info!("Alert payload (not sent):\n{json}");
        Ok(())
    }

    async fn notice(&self, text: &str) -> Result<()> {
        info!(notice = %text, "Notice (not sent)");
        Ok(())
    }
}
