use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use common::{Candle, MarketDataSource, Timeframe};
use strategy::StrategyInstance;

/// One strategy match found during replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySignal {
    pub strategy_name: String,
    pub candle_time: DateTime<Utc>,
    /// Position of the evaluated candle in the loaded series.
    pub index: usize,
    pub detail: String,
}

/// Outcome of a replay: how often each strategy would have fired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestReport {
    pub instrument: String,
    pub timeframe: Option<Timeframe>,
    pub candles: usize,
    /// Match count per strategy name. Every replayed strategy has an entry.
    pub counts: BTreeMap<String, usize>,
    pub signals: Vec<ReplaySignal>,
}

impl BacktestReport {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl std::fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "-".repeat(50);
        writeln!(f, "{rule}")?;
        match self.timeframe {
            Some(tf) => writeln!(f, "Backtesting results for {} ({tf}):", self.instrument)?,
            None => writeln!(f, "Backtesting results for {}:", self.instrument)?,
        }
        writeln!(f, "Candles replayed: {}", self.candles)?;
        if self.total() == 0 {
            writeln!(f, "No signals were generated during the backtesting period.")?;
        } else {
            for (name, count) in &self.counts {
                writeln!(f, "- {name}: {count} signals generated.")?;
            }
            writeln!(f, "Total: {}", self.total())?;
        }
        write!(f, "{rule}")
    }
}

/// Slide every strategy over `candles`, oldest first, and count matches.
///
/// Evaluation starts at the index equal to the largest minimum window among
/// `strategies`; each strategy sees the trailing window of its own minimum
/// size ending at the current index. Pure and deterministic.
pub fn replay(candles: &[Candle], strategies: &[StrategyInstance]) -> BacktestReport {
    let mut report = BacktestReport {
        candles: candles.len(),
        counts: strategies.iter().map(|s| (s.name().to_string(), 0)).collect(),
        ..BacktestReport::default()
    };

    let Some(max_lookback) = strategies
        .iter()
        .map(StrategyInstance::min_required_completed_candles)
        .max()
    else {
        return report;
    };

    for i in max_lookback..candles.len() {
        for s in strategies {
            let needed = s.min_required_completed_candles();
            let window = &candles[i + 1 - needed..=i];
            if window.len() < needed {
                continue;
            }

            let result = s.strategy().check(window);
            if !result.matched {
                continue;
            }

            let candle_time = candles[i].timestamp;
            info!(
                candle = %candle_time,
                strategy = %s.name(),
                index = i,
                detail = %result.detail,
                "SIGNAL"
            );
            *report.counts.entry(s.name().to_string()).or_default() += 1;
            report.signals.push(ReplaySignal {
                strategy_name: s.name().to_string(),
                candle_time,
                index: i,
                detail: result.detail,
            });
        }
    }

    report
}

/// Replays historical candles through the live strategies without polling.
pub struct Backtester {
    source: Arc<dyn MarketDataSource>,
    strategies: Vec<StrategyInstance>,
}

impl Backtester {
    pub fn new(source: Arc<dyn MarketDataSource>, strategies: Vec<StrategyInstance>) -> Self {
        Self { source, strategies }
    }

    /// Fetch `[start, end]` once and replay it through the strategies
    /// configured for this instrument and timeframe.
    ///
    /// The range is loaded in a single `fetch_range` call; any paging is up to
    /// the source. A failed or empty fetch yields a report with zero counts.
    pub async fn run(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BacktestReport {
        let active: Vec<StrategyInstance> = self
            .strategies
            .iter()
            .filter(|s| s.instrument() == instrument && s.timeframe() == timeframe)
            .cloned()
            .collect();

        let mut report = BacktestReport {
            instrument: instrument.to_string(),
            timeframe: Some(timeframe),
            counts: active.iter().map(|s| (s.name().to_string(), 0)).collect(),
            ..BacktestReport::default()
        };

        if active.is_empty() {
            warn!(instrument, timeframe = %timeframe, "No strategies configured for this pair");
            return report;
        }

        info!(instrument, timeframe = %timeframe, %start, %end, "Fetching historical data");
        let candles = match self.source.fetch_range(instrument, timeframe, start, end).await {
            Ok(candles) => candles,
            Err(e) => {
                error!(error = %e, "Error fetching historical data");
                return report;
            }
        };
        let candles: Vec<Candle> = candles.into_iter().filter(|c| c.complete).collect();
        if candles.is_empty() {
            error!("No historical candles returned for the specified range");
            return report;
        }

        info!(candles = candles.len(), strategies = active.len(), "Starting replay");
        let replayed = replay(&candles, &active);
        report.candles = replayed.candles;
        report.counts = replayed.counts;
        report.signals = replayed.signals;
        report
    }
}
