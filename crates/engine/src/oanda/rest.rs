use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use common::{Candle, Error, MarketDataSource, OandaEnv, Result, Timeframe};

/// OANDA's per-request candle ceiling.
pub const MAX_CANDLES_PER_REQUEST: usize = 5000;

/// REST client for the OANDA v20 instruments API. Midpoint candles only.
pub struct OandaClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OandaClient {
    pub fn new(api_key: impl Into<String>, env: OandaEnv, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        info!(env = %env, timeout = ?timeout, "OandaClient initialized");
        Ok(Self {
            api_key: api_key.into(),
            base_url: env.base_url().to_string(),
            http,
        })
    }

    /// One candles request. Returns every bar in the response, including a
    /// forming one; callers filter.
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        params: &[(&str, String)],
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/v3/instruments/{instrument}/candles", self.base_url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("granularity", timeframe.code()), ("price", "M")])
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::DataSource(format!("HTTP {status}: {snippet}")));
        }
        parse_candles(&body)
    }
}

#[async_trait]
impl MarketDataSource for OandaClient {
    async fn fetch_recent(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let count = count.clamp(1, MAX_CANDLES_PER_REQUEST);
        debug!(instrument, timeframe = %timeframe, count, "Fetching recent candles");
        let candles = self
            .get_candles(instrument, timeframe, &[("count", count.to_string())])
            .await?;
        Ok(candles.into_iter().filter(|c| c.complete).collect())
    }

    /// Pages forward from `from` in chunks of `MAX_CANDLES_PER_REQUEST` until
    /// the range is covered.
    async fn fetch_range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        if from > to {
            return Err(Error::Config(format!("range start {from} is after end {to}")));
        }

        let out = collect_range(from, to, MAX_CANDLES_PER_REQUEST, |cursor, include_first| async move {
            debug!(instrument, timeframe = %timeframe, from = %cursor, "Fetching candle page");
            self.get_candles(
                instrument,
                timeframe,
                &[
                    ("from", rfc3339(cursor)),
                    ("count", MAX_CANDLES_PER_REQUEST.to_string()),
                    ("includeFirst", include_first.to_string()),
                ],
            )
            .await
        })
        .await?;

        info!(instrument, timeframe = %timeframe, candles = out.len(), "Loaded candle range");
        Ok(out)
    }
}

/// Page forward from `from` until `to` is covered.
///
/// `fetch_page(cursor, include_first)` returns up to `page_size` bars starting
/// at `cursor`. Paging stops on a short or empty page, once a page reaches
/// `to`, or when a page fails to move past the cursor. Only completed bars at
/// or before `to` are kept, each timestamp once, oldest first.
async fn collect_range<F, Fut>(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    page_size: usize,
    mut fetch_page: F,
) -> Result<Vec<Candle>>
where
    F: FnMut(DateTime<Utc>, bool) -> Fut,
    Fut: Future<Output = Result<Vec<Candle>>>,
{
    let mut out: Vec<Candle> = Vec::new();
    let mut cursor = from;
    let mut include_first = true;

    loop {
        let page = fetch_page(cursor, include_first).await?;
        let page_len = page.len();
        let Some(last_time) = page.last().map(|c| c.timestamp) else {
            break;
        };

        for candle in page {
            let after_kept = out.last().map_or(true, |kept| candle.timestamp > kept.timestamp);
            if candle.complete && candle.timestamp <= to && after_kept {
                out.push(candle);
            }
        }

        if page_len < page_size || last_time >= to || last_time <= cursor {
            break;
        }
        cursor = last_time;
        include_first = false;
    }

    Ok(out)
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode an OANDA candles response body.
pub fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let resp: CandlesResponse =
        serde_json::from_str(body).map_err(|e| Error::DataSource(e.to_string()))?;
    resp.candles.into_iter().map(OandaCandle::into_candle).collect()
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<OandaCandle>,
}

#[derive(Deserialize)]
struct OandaCandle {
    complete: bool,
    time: DateTime<Utc>,
    mid: Option<Ohlc>,
}

#[derive(Deserialize)]
struct Ohlc {
    o: String,
    h: String,
    l: String,
    c: String,
}

impl OandaCandle {
    fn into_candle(self) -> Result<Candle> {
        let mid = self
            .mid
            .ok_or_else(|| Error::DataSource(format!("candle at {} has no midpoint prices", self.time)))?;
        let price = |field: &str, raw: &str| {
            raw.parse::<f64>()
                .map_err(|e| Error::DataSource(format!("bad {field} price '{raw}': {e}")))
        };
        Ok(Candle {
            open: price("open", &mid.o)?,
            high: price("high", &mid.h)?,
            low: price("low", &mid.l)?,
            close: price("close", &mid.c)?,
            timestamp: self.time,
            complete: self.complete,
        })
    }
}
