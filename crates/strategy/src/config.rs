use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result, Timeframe};

/// Top-level strategy config file (TOML).
///
/// Example file, passed with `--config` or `STRATEGY_CONFIG_PATH`:
/// ```toml
/// [[strategy]]
/// type = "engulfing"
/// name = "Gold engulfing H1"
/// instrument = "XAU_USD"
/// timeframe = "H1"
///
/// [[strategy]]
/// type = "sr_breakout"
/// name = "EURJPY breakout M15"
/// instrument = "EUR_JPY"
/// timeframe = "M15"
///
/// [strategy.params]
/// lookback = 50
/// pip_size = 0.01
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "engulfing" or "sr_breakout".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs, alerts and reports.
    /// Defaults to the strategy type's label.
    #[serde(default)]
    pub name: Option<String>,
    /// Broker instrument, e.g. "XAU_USD".
    pub instrument: String,
    pub timeframe: Timeframe,
    /// Overrides the number of bars requested per fetch.
    #[serde(default)]
    pub required_candles: Option<usize>,
    /// Detector-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse strategy config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}
