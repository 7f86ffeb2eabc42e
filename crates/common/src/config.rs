use std::time::Duration;

use tracing::debug;

use crate::{Error, OandaEnv, Result};

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Broker credentials
    pub oanda_api_key: String,
    pub oanda_account_id: String,
    pub oanda_env: OandaEnv,

    // Notification sinks. Both optional; with neither set alerts are logged.
    pub webhook_url: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Vec<i64>,

    // Scheduling
    pub poll_interval: Duration,
    pub http_timeout: Duration,

    // Strategy config file path
    pub strategy_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Missing credentials are a configuration error.
    pub fn from_env() -> Result<Self> {
        // .env is optional
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                Error::Config(format!(
                    "required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let oanda_env = match optional("OANDA_ENV")
            .unwrap_or_else(|| "practice".to_string())
            .to_lowercase()
            .as_str()
        {
            "practice" => OandaEnv::Practice,
            "live" => OandaEnv::Live,
            other => {
                return Err(Error::Config(format!(
                    "OANDA_ENV must be 'practice' or 'live', got: '{other}'"
                )))
            }
        };

        let telegram_chat_ids = optional("TELEGRAM_CHAT_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<i64>().map_err(|_| {
                            Error::Config(format!(
                                "TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let secs = |key: &str, default: u64| -> Result<Duration> {
            match optional(key) {
                None => Ok(Duration::from_secs(default)),
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|&n| n > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        Error::Config(format!("{key} must be a positive number of seconds, got '{v}'"))
                    }),
            }
        };

        Ok(Config {
            oanda_api_key: required("OANDA_API_KEY")?,
            oanda_account_id: required("OANDA_ACCOUNT_ID")?,
            oanda_env,
            webhook_url: optional("WEBHOOK_URL"),
            telegram_token: optional("TELEGRAM_TOKEN"),
            telegram_chat_ids,
            poll_interval: secs("POLL_INTERVAL_SECS", 60)?,
            http_timeout: secs("HTTP_TIMEOUT_SECS", 10)?,
            strategy_config_path: optional("STRATEGY_CONFIG_PATH"),
        })
    }
}
