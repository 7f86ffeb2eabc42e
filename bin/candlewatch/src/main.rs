use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backtest::Backtester;
use common::{parse_instant, Config, MarketDataSource, Timeframe};
use engine::{Engine, OandaClient, Scanner};
use strategy::{StrategyFileConfig, StrategyRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Live,
    Backtest,
}

/// Candle-pattern alerting against OANDA market data.
#[derive(Debug, Parser)]
#[command(name = "candlewatch", version)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Live)]
    mode: Mode,

    /// OANDA instrument, e.g. XAU_USD or EUR_USD.
    #[arg(long, default_value = "XAU_USD")]
    instrument: String,

    /// OANDA granularity code (M1, M15, H1, H4, D, ...).
    #[arg(long, default_value = "H1")]
    timeframe: Timeframe,

    /// Comma-separated strategies (engulfing, sr_breakout) or "all".
    #[arg(long, default_value = "all")]
    strategies: String,

    /// Backtest start: YYYY-MM-DD or RFC 3339.
    #[arg(long)]
    start_date: Option<String>,

    /// Backtest end: YYYY-MM-DD or RFC 3339.
    #[arg(long)]
    end_date: Option<String>,

    /// Strategy TOML file. Overrides --instrument, --timeframe and --strategies.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("failed to load configuration")?;
    info!(mode = ?cli.mode, oanda_env = %cfg.oanda_env, "candlewatch starting");

    // ── Strategy registry ─────────────────────────────────────────────────────
    let config_path = cli.config.clone().or_else(|| cfg.strategy_config_path.clone());
    let registry = match &config_path {
        Some(path) => {
            info!(path = %path, "Loading strategies from file");
            let file = StrategyFileConfig::load(path)?;
            StrategyRegistry::from_config(&file)?
        }
        None => StrategyRegistry::from_selection(&cli.strategies, &cli.instrument, cli.timeframe)?,
    };

    // ── Market data ───────────────────────────────────────────────────────────
    let source: Arc<dyn MarketDataSource> = Arc::new(OandaClient::new(
        cfg.oanda_api_key.clone(),
        cfg.oanda_env,
        cfg.http_timeout,
    )?);

    match cli.mode {
        Mode::Live => run_live(&cfg, source, registry).await,
        Mode::Backtest => run_backtest(&cli, source, registry).await,
    }
}

async fn run_live(
    cfg: &Config,
    source: Arc<dyn MarketDataSource>,
    registry: StrategyRegistry,
) -> anyhow::Result<()> {
    let notifier = notify::from_config(cfg)?;
    let scanner = Scanner::new(source, notifier, registry.into_strategies());
    let (engine, handle) = Engine::new(scanner, cfg.poll_interval);

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::spawn(handle.clone().stop_on(tokio::signal::ctrl_c()));

    let ticks = engine.run().await;
    info!(ticks, "Live loop finished");
    Ok(())
}

async fn run_backtest(
    cli: &Cli,
    source: Arc<dyn MarketDataSource>,
    registry: StrategyRegistry,
) -> anyhow::Result<()> {
    let (Some(start), Some(end)) = (&cli.start_date, &cli.end_date) else {
        bail!("--start-date and --end-date are required in backtest mode");
    };
    let start = parse_instant(start)?;
    let end = parse_instant(end)?;
    if start >= end {
        bail!("--start-date ({start}) must be before --end-date ({end})");
    }

    let pairs = registry.pairs();
    let backtester = Backtester::new(source, registry.into_strategies());
    for pair in pairs {
        let report = backtester
            .run(&pair.instrument, pair.timeframe, start, end)
            .await;
        println!("{report}");
    }
    Ok(())
}
