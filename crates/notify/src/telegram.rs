use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{info, warn};

use common::{AlertPayload, Error, Notifier, Result};

use crate::format_alert;

/// Sends alerts to every configured Telegram chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_ids: &[i64]) -> Self {
        Self {
            bot: Bot::new(token),
            chat_ids: chat_ids.iter().map(|&id| ChatId(id)).collect(),
        }
    }

    /// Tries every chat; reports the first failure after all attempts.
    async fn send_all(&self, text: &str) -> Result<()> {
        let mut first_err = None;
        for &chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(chat_id, text.to_string()).await {
                warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram message");
                if first_err.is_none() {
                    first_err = Some(Error::Notification(format!("telegram: {e}")));
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, payload: &AlertPayload) -> Result<()> {
        self.send_all(&format_alert(payload)).await?;
        info!(strategy = %payload.strategy_name, chats = self.chat_ids.len(), "Telegram alert sent");
        Ok(())
    }

    async fn notice(&self, text: &str) -> Result<()> {
        self.send_all(text).await
    }
}
