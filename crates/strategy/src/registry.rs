use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::info;

use common::{Error, PairKey, Result, Timeframe};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::{EngulfingDetector, SrBreakoutDetector, Strategy, StrategyInstance, StrategyKind, PIP_SIZE};

/// Holds all active strategy instances.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<StrategyInstance>,
}

impl StrategyRegistry {
    /// Validate and register a set of instances. Names must be unique per
    /// instrument and timeframe, since results are reported by name.
    pub fn new(strategies: Vec<StrategyInstance>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config("no strategies configured".to_string()));
        }

        let mut seen = HashSet::new();
        for s in &strategies {
            if !seen.insert((s.key(), s.name().to_string())) {
                return Err(Error::Config(format!(
                    "duplicate strategy name '{}' for {}",
                    s.name(),
                    s.key()
                )));
            }
            info!(
                name = %s.name(),
                instrument = %s.instrument(),
                timeframe = %s.timeframe(),
                required = s.required_candles(),
                min_completed = s.min_required_completed_candles(),
                "Registered strategy"
            );
        }

        Ok(Self { strategies })
    }

    /// Build the registry from the strategy config file.
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self> {
        let strategies = file_cfg
            .strategies
            .iter()
            .map(build_instance)
            .collect::<Result<Vec<_>>>()?;
        Self::new(strategies)
    }

    /// Build the registry from a CLI selection: `"all"` or a comma-separated
    /// list of strategy types, each with default parameters.
    pub fn from_selection(selection: &str, instrument: &str, timeframe: Timeframe) -> Result<Self> {
        let kinds: Vec<StrategyKind> = if selection.trim().eq_ignore_ascii_case("all") {
            StrategyKind::ALL.to_vec()
        } else {
            let mut kinds = Vec::new();
            for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let kind: StrategyKind = part.parse()?;
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            kinds
        };

        let strategies = kinds
            .into_iter()
            .map(|kind| StrategyInstance::new(kind.label(), instrument, timeframe, kind.default_strategy()))
            .collect();
        Self::new(strategies)
    }

    pub fn strategies(&self) -> &[StrategyInstance] {
        &self.strategies
    }

    pub fn into_strategies(self) -> Vec<StrategyInstance> {
        self.strategies
    }

    /// Instances configured for one instrument and timeframe, in
    /// registration order.
    pub fn for_pair(&self, key: &PairKey) -> Vec<StrategyInstance> {
        self.strategies
            .iter()
            .filter(|s| s.instrument() == key.instrument && s.timeframe() == key.timeframe)
            .cloned()
            .collect()
    }

    /// Distinct pairs watched by any strategy, sorted.
    pub fn pairs(&self) -> Vec<PairKey> {
        self.strategies
            .iter()
            .map(StrategyInstance::key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_instance(cfg: &StrategyConfig) -> Result<StrategyInstance> {
    let kind: StrategyKind = cfg.strategy_type.parse()?;
    let strategy = build_strategy(kind, &cfg.params)?;
    let name = cfg.name.clone().unwrap_or_else(|| kind.label().to_string());
    let instance = StrategyInstance::new(name, cfg.instrument.clone(), cfg.timeframe, strategy);
    match cfg.required_candles {
        Some(required) => instance.with_required_candles(required),
        None => Ok(instance),
    }
}

fn build_strategy(kind: StrategyKind, params: &HashMap<String, toml::Value>) -> Result<Strategy> {
    match kind {
        StrategyKind::Engulfing => Ok(Strategy::Engulfing(EngulfingDetector)),
        StrategyKind::SrBreakout => {
            let defaults = SrBreakoutDetector::default();
            let lookback = param_usize(params, "lookback", defaults.lookback)?;
            let pip_size = param_f64(params, "pip_size", PIP_SIZE)?;
            if lookback < 2 {
                return Err(Error::Config(format!(
                    "sr_breakout lookback must be at least 2, got {lookback}"
                )));
            }
            if !(pip_size.is_finite() && pip_size > 0.0) {
                return Err(Error::Config(format!(
                    "sr_breakout pip_size must be positive, got {pip_size}"
                )));
            }
            Ok(Strategy::SrBreakout(SrBreakoutDetector::new(lookback, pip_size)))
        }
    }
}

/// Numeric parameter; integers are accepted. Absent means `default`, a value
/// of the wrong type is a configuration error.
fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> Result<f64> {
    let Some(value) = params.get(key) else {
        return Ok(default);
    };
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| Error::Config(format!("param '{key}' must be a number, got {value}")))
}

fn param_usize(params: &HashMap<String, toml::Value>, key: &str, default: usize) -> Result<usize> {
    let Some(value) = params.get(key) else {
        return Ok(default);
    };
    value
        .as_integer()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            Error::Config(format!("param '{key}' must be a non-negative integer, got {value}"))
        })
}
