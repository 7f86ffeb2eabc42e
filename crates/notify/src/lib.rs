pub mod console;
pub mod telegram;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use common::{AlertPayload, Config, Notifier, Result};

pub use console::ConsoleNotifier;
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

/// Human-readable alert body shared by every outbound sink.
pub fn format_alert(payload: &AlertPayload) -> String {
    format!(
        "**STRATEGY ALERT: {}**\n\
         Instrument: {}\n\
         Timeframe: {}\n\
         Candle Time: {}\n\
         Setup: {}",
        payload.strategy_name,
        payload.instrument,
        payload.timeframe,
        payload.candle_time.to_rfc3339(),
        payload.message,
    )
}

/// Delivers to several sinks. Every sink is attempted; the first failure is
/// returned.
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn deliver(&self, payload: &AlertPayload) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(payload).await {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn notice(&self, text: &str) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notice(text).await {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Pick sinks from the environment config. Falls back to the console when
/// nothing is configured.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn Notifier>> {
    let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(url) = &cfg.webhook_url {
        info!("Webhook notifier enabled");
        sinks.push(Box::new(WebhookNotifier::new(url.clone(), cfg.http_timeout)?));
    }

    match (&cfg.telegram_token, cfg.telegram_chat_ids.is_empty()) {
        (Some(token), false) => {
            info!(chats = cfg.telegram_chat_ids.len(), "Telegram notifier enabled");
            sinks.push(Box::new(TelegramNotifier::new(token.clone(), &cfg.telegram_chat_ids)));
        }
        (Some(_), true) => warn!("TELEGRAM_TOKEN set but TELEGRAM_CHAT_IDS is empty; Telegram disabled"),
        (None, _) => {}
    }

    let notifier: Arc<dyn Notifier> = match sinks.len() {
        0 => {
            warn!("No notification sink configured. Alerts will be logged to console.");
            Arc::new(ConsoleNotifier)
        }
        1 => Arc::from(sinks.remove(0)),
        _ => Arc::new(FanoutNotifier::new(sinks)),
    };
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use common::{Error, Timeframe};

    use super::*;

    fn payload() -> AlertPayload {
        AlertPayload {
            strategy_name: "Engulfing".into(),
            instrument: "XAU_USD".into(),
            timeframe: Timeframe::H1,
            candle_time: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            message: "Engulfing pattern found (BEAR signal)".into(),
        }
    }

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingSink {
        async fn deliver(&self, _payload: &AlertPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Notification("down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn alert_body_lists_every_field() {
        let body = format_alert(&payload());
        assert!(body.starts_with("**STRATEGY ALERT: Engulfing**"));
        assert!(body.contains("Instrument: XAU_USD"));
        assert!(body.contains("Timeframe: H1"));
        assert!(body.contains("Candle Time: 2024-01-15T10:00:00+00:00"));
        assert!(body.contains("Setup: Engulfing pattern found (BEAR signal)"));
    }

    #[tokio::test]
    async fn console_sink_always_succeeds() {
        assert!(ConsoleNotifier.deliver(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn fanout_attempts_every_sink_and_reports_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sinks: Vec<Box<dyn Notifier>> = vec![
            Box::new(CountingSink { calls: calls.clone(), fail: true }),
            Box::new(CountingSink { calls: calls.clone(), fail: false }),
        ];
        let fanout = FanoutNotifier::new(sinks);

        let result = fanout.deliver(&payload()).await;
        assert!(matches!(result, Err(Error::Notification(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn notices_reach_every_sink() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sinks: Vec<Box<dyn Notifier>> = vec![
            Box::new(ConsoleNotifier),
            Box::new(CountingSink { calls: calls.clone(), fail: true }),
        ];
        let fanout = FanoutNotifier::new(sinks);

        // Sinks without a notice channel accept and drop it.
        assert!(fanout.notice("candlewatch started").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_configured_sink_falls_back_to_console() {
        let cfg = Config::from_lookup(|key| match key {
            "OANDA_API_KEY" => Some("key".into()),
            "OANDA_ACCOUNT_ID" => Some("101".into()),
            "TELEGRAM_TOKEN" => Some("123:abc".into()),
            _ => None,
        })
        .unwrap();
        assert!(from_config(&cfg).is_ok());
    }
}
