use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AlertPayload, Candle, Result, Timeframe};

/// Abstraction over the broker's candle API.
///
/// `OandaClient` in `crates/engine` implements this for live and historical
/// data. Implementations return completed candles only, oldest first.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// The `count` most recent bars, with the still-forming bar filtered out.
    /// May therefore return fewer than `count` candles.
    async fn fetch_recent(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;

    /// All completed bars in the closed range `[from, to]`.
    async fn fetch_range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

/// Outbound alert sink. Failures are reported to the caller, who logs them;
/// nothing retries a failed delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &AlertPayload) -> Result<()>;

    /// Free-form operational message such as the startup notice. Sinks that
    /// only carry alerts may ignore it.
    async fn notice(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
