use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use backtest::{replay, Backtester};
use common::{Candle, Error, MarketDataSource, Result, Timeframe};
use strategy::{StrategyInstance, StrategyRegistry};

struct HistorySource {
    candles: Mutex<Option<Vec<Candle>>>,
    range_calls: AtomicUsize,
}

impl HistorySource {
    fn ok(candles: Vec<Candle>) -> Arc<Self> {
        Arc::new(Self {
            candles: Mutex::new(Some(candles)),
            range_calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            candles: Mutex::new(None),
            range_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MarketDataSource for HistorySource {
    async fn fetch_recent(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
        Err(Error::DataSource("replay never polls".into()))
    }

    async fn fetch_range(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.candles
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Http("503 Service Unavailable".into()))
    }
}

fn candle(i: usize, open: f64, close: f64) -> Candle {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    Candle {
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        timestamp: start + Duration::hours(i as i64),
        complete: true,
    }
}

/// Flat history with one bearish engulfing ending at `at`.
fn history(len: usize, at: usize) -> Vec<Candle> {
    let mut bodies = vec![(10.0, 10.0); len];
    bodies[at - 3] = (10.0, 11.0);
    bodies[at - 2] = (11.0, 12.0);
    bodies[at - 1] = (12.0, 13.0);
    bodies[at] = (13.0, 11.0);
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, (o, c))| candle(i, o, c))
        .collect()
}

fn strategies(selection: &str) -> Vec<StrategyInstance> {
    StrategyRegistry::from_selection(selection, "XAU_USD", Timeframe::H1)
        .unwrap()
        .into_strategies()
}

fn range() -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn run_replays_the_fetched_range_once() {
    let source = HistorySource::ok(history(30, 20));
    let backtester = Backtester::new(source.clone(), strategies("engulfing"));
    let (start, end) = range();

    let report = backtester.run("XAU_USD", Timeframe::H1, start, end).await;
    assert_eq!(report.instrument, "XAU_USD");
    assert_eq!(report.timeframe, Some(Timeframe::H1));
    assert_eq!(report.candles, 30);
    assert_eq!(report.counts["Engulfing"], 1);
    assert_eq!(report.signals[0].index, 20);
    assert_eq!(source.range_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fetch_failure_reports_zero_for_every_strategy() {
    let source = HistorySource::failing();
    let backtester = Backtester::new(source, strategies("all"));
    let (start, end) = range();

    let report = backtester.run("XAU_USD", Timeframe::H1, start, end).await;
    assert_eq!(report.total(), 0);
    assert_eq!(report.counts.len(), 2);
    assert!(report.counts.values().all(|&n| n == 0));
    assert!(report.to_string().contains("No signals were generated"));
}

#[tokio::test]
async fn empty_range_reports_zero() {
    let backtester = Backtester::new(HistorySource::ok(Vec::new()), strategies("engulfing"));
    let (start, end) = range();

    let report = backtester.run("XAU_USD", Timeframe::H1, start, end).await;
    assert_eq!(report.candles, 0);
    assert_eq!(report.counts["Engulfing"], 0);
}

#[tokio::test]
async fn forming_candle_is_not_replayed() {
    let mut candles = history(30, 20);
    let mut forming = candle(30, 10.0, 30.0);
    forming.complete = false;
    candles.push(forming);

    let backtester = Backtester::new(HistorySource::ok(candles), strategies("engulfing"));
    let (start, end) = range();
    let report = backtester.run("XAU_USD", Timeframe::H1, start, end).await;
    assert_eq!(report.candles, 30);
    assert_eq!(report.counts["Engulfing"], 1);
}

#[tokio::test]
async fn other_pairs_are_left_out() {
    let source = HistorySource::ok(history(30, 20));
    let backtester = Backtester::new(source.clone(), strategies("engulfing"));
    let (start, end) = range();

    let report = backtester.run("EUR_USD", Timeframe::H1, start, end).await;
    assert!(report.counts.is_empty());
    assert_eq!(source.range_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn replay_agrees_with_live_evaluation() {
    let candles = history(80, 60);
    let strategies = strategies("all");
    let report = replay(&candles, &strategies);

    let max_lookback = strategies
        .iter()
        .map(StrategyInstance::min_required_completed_candles)
        .max()
        .unwrap();
    let mut live = 0;
    for i in max_lookback..candles.len() {
        for s in &strategies {
            if s.evaluate(&candles[..=i]).unwrap().matched {
                live += 1;
            }
        }
    }
    assert_eq!(report.total(), live);
}
