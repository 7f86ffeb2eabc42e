pub mod config;
pub mod detectors;
pub mod registry;

use std::str::FromStr;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use detectors::{EngulfingDetector, SrBreakoutDetector, PIP_SIZE};
pub use registry::StrategyRegistry;

use common::{Candle, DetectionResult, Error, PairKey, Result, Timeframe};

/// The closed set of detector variants. Each carries its own parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Engulfing(EngulfingDetector),
    SrBreakout(SrBreakoutDetector),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Engulfing(_) => StrategyKind::Engulfing,
            Strategy::SrBreakout(_) => StrategyKind::SrBreakout,
        }
    }

    /// Completed candles the detector math needs.
    pub fn min_required_completed_candles(&self) -> usize {
        match self {
            Strategy::Engulfing(_) => EngulfingDetector::MIN_CANDLES,
            Strategy::SrBreakout(d) => d.min_candles(),
        }
    }

    /// Bars to request from the source by default, leaving room for the
    /// forming bar that gets filtered out.
    pub fn default_required_candles(&self) -> usize {
        match self {
            Strategy::Engulfing(_) => EngulfingDetector::REQUIRED_CANDLES,
            Strategy::SrBreakout(d) => d.min_candles() + 1,
        }
    }

    pub fn check(&self, candles: &[Candle]) -> DetectionResult {
        match self {
            Strategy::Engulfing(d) => d.check(candles),
            Strategy::SrBreakout(d) => d.check(candles),
        }
    }
}

/// Strategy type identifier as used on the CLI and in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Engulfing,
    SrBreakout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Engulfing, StrategyKind::SrBreakout];

    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Engulfing => "engulfing",
            StrategyKind::SrBreakout => "sr_breakout",
        }
    }

    /// Default instance name shown in logs, alerts and backtest reports.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Engulfing => "Engulfing",
            StrategyKind::SrBreakout => "SRBreakout",
        }
    }

    pub fn default_strategy(&self) -> Strategy {
        match self {
            StrategyKind::Engulfing => Strategy::Engulfing(EngulfingDetector),
            StrategyKind::SrBreakout => Strategy::SrBreakout(SrBreakoutDetector::default()),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "engulfing" => Ok(StrategyKind::Engulfing),
            "sr_breakout" | "srbreakout" | "sr" => Ok(StrategyKind::SrBreakout),
            other => Err(Error::Config(format!(
                "unknown strategy '{other}' (expected 'engulfing' or 'sr_breakout')"
            ))),
        }
    }
}

/// A detector bound to one instrument and timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyInstance {
    name: String,
    instrument: String,
    timeframe: Timeframe,
    strategy: Strategy,
    required_candles: usize,
}

impl StrategyInstance {
    pub fn new(
        name: impl Into<String>,
        instrument: impl Into<String>,
        timeframe: Timeframe,
        strategy: Strategy,
    ) -> Self {
        let required_candles = strategy.default_required_candles();
        Self {
            name: name.into(),
            instrument: instrument.into(),
            timeframe,
            strategy,
            required_candles,
        }
    }

    /// Override the requested bar count. It must exceed the completed-candle
    /// minimum so that dropping the forming bar still leaves enough data.
    pub fn with_required_candles(mut self, required: usize) -> Result<Self> {
        let min = self.min_required_completed_candles();
        if required <= min {
            return Err(Error::Config(format!(
                "strategy '{}': required_candles ({required}) must exceed the minimum of {min} completed candles",
                self.name
            )));
        }
        self.required_candles = required;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(self.instrument.clone(), self.timeframe)
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn required_candles(&self) -> usize {
        self.required_candles
    }

    pub fn min_required_completed_candles(&self) -> usize {
        self.strategy.min_required_completed_candles()
    }

    /// Run the detector on the trailing window of exactly
    /// `min_required_completed_candles`, the same window the replay engine
    /// uses. Too few candles is an error rather than a negative result so
    /// callers can tell "no pattern" from "could not look".
    pub fn evaluate(&self, candles: &[Candle]) -> Result<DetectionResult> {
        let needed = self.min_required_completed_candles();
        if candles.len() < needed {
            return Err(Error::InsufficientData {
                needed,
                got: candles.len(),
            });
        }
        Ok(self.strategy.check(&candles[candles.len() - needed..]))
    }
}
