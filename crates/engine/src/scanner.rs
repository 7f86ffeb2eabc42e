use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use common::{AlertPayload, MarketDataSource, Notifier, PairKey};
use strategy::StrategyInstance;

use crate::freshness::FreshnessTracker;

/// Bars requested to learn the latest completed timestamp. One spare covers
/// the forming bar the source filters out.
pub const PROBE_CANDLES: usize = 2;

/// Strategies sharing one instrument and timeframe, and therefore one fetch.
#[derive(Debug, Clone)]
pub struct StrategyGroup {
    pub key: PairKey,
    pub members: Vec<StrategyInstance>,
}

impl StrategyGroup {
    /// Bar count of the most data-hungry member.
    pub fn fetch_count(&self) -> usize {
        self.members
            .iter()
            .map(StrategyInstance::required_candles)
            .max()
            .unwrap_or(PROBE_CANDLES)
    }
}

/// Counters for one `run_all_checks` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub groups: usize,
    /// Probe or full fetch failed or came back empty.
    pub skipped_no_data: usize,
    /// Latest completed candle already evaluated.
    pub skipped_unchanged: usize,
    pub groups_evaluated: usize,
    pub evaluations: usize,
    pub failures: usize,
    pub alerts: usize,
}

/// Alerts already sent for a candle whose group pass did not complete.
/// Keeps the retry on the next tick from repeating them.
#[derive(Debug)]
struct PendingRetry {
    candle: DateTime<Utc>,
    alerted: HashSet<String>,
}

/// The live scanning loop body: polls every group once per tick and alerts
/// on matches against newly completed candles.
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn Notifier>,
    groups: Vec<StrategyGroup>,
    freshness: FreshnessTracker,
    retries: HashMap<PairKey, PendingRetry>,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        notifier: Arc<dyn Notifier>,
        strategies: Vec<StrategyInstance>,
    ) -> Self {
        let mut by_pair: BTreeMap<PairKey, Vec<StrategyInstance>> = BTreeMap::new();
        for s in strategies {
            by_pair.entry(s.key()).or_default().push(s);
        }
        let groups: Vec<StrategyGroup> = by_pair
            .into_iter()
            .map(|(key, members)| StrategyGroup { key, members })
            .collect();

        info!(groups = groups.len(), "Scanner initialized");
        Self {
            source,
            notifier,
            groups,
            freshness: FreshnessTracker::new(),
            retries: HashMap::new(),
        }
    }

    pub fn groups(&self) -> &[StrategyGroup] {
        &self.groups
    }

    pub fn freshness(&self) -> &FreshnessTracker {
        &self.freshness
    }

    /// Text of the one-off startup notice.
    pub fn startup_notice(&self) -> String {
        let pairs: Vec<String> = self.groups.iter().map(|g| g.key.to_string()).collect();
        let strategies: usize = self.groups.iter().map(|g| g.members.len()).sum();
        format!(
            "candlewatch started: {strategies} strategies on {}",
            pairs.join(", ")
        )
    }

    /// Tell the notifier the scanner is up. Failure is logged, never fatal.
    pub async fn announce_start(&self) {
        let text = self.startup_notice();
        match self.notifier.notice(&text).await {
            Ok(()) => info!("Startup notice sent"),
            Err(e) => warn!(error = %e, "Startup notice failed"),
        }
    }

    /// One polling tick. Never fails: every error is logged and turned into
    /// a skipped group or a failed evaluation.
    pub async fn run_all_checks(&mut self) -> TickSummary {
        let mut summary = TickSummary {
            groups: self.groups.len(),
            ..TickSummary::default()
        };
        for idx in 0..self.groups.len() {
            self.scan_group(idx, &mut summary).await;
        }
        debug!(?summary, "Tick complete");
        summary
    }

    async fn scan_group(&mut self, idx: usize, summary: &mut TickSummary) {
        let group = &self.groups[idx];
        let key = &group.key;

        // Cheap probe first: most ticks nothing has closed.
        let probe = match self
            .source
            .fetch_recent(&key.instrument, key.timeframe, PROBE_CANDLES)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(pair = %key, error = %e, "Probe fetch failed, skipping this tick");
                summary.skipped_no_data += 1;
                return;
            }
        };
        let Some(latest) = probe.iter().filter(|c| c.complete).map(|c| c.timestamp).max() else {
            warn!(pair = %key, "No completed candles returned, skipping this tick");
            summary.skipped_no_data += 1;
            return;
        };

        if !self.freshness.is_new(key, latest) {
            debug!(pair = %key, candle = %latest, "No new candle");
            summary.skipped_unchanged += 1;
            return;
        }

        let count = group.fetch_count();
        let candles = match self
            .source
            .fetch_recent(&key.instrument, key.timeframe, count)
            .await
        {
            Ok(mut candles) => {
                candles.retain(|c| c.complete);
                candles
            }
            Err(e) => {
                warn!(pair = %key, error = %e, "Candle fetch failed, skipping this tick");
                summary.skipped_no_data += 1;
                return;
            }
        };
        let Some(evaluated_through) = candles.last().map(|c| c.timestamp) else {
            warn!(pair = %key, "Candle fetch returned no completed candles");
            summary.skipped_no_data += 1;
            return;
        };

        info!(pair = %key, candle = %evaluated_through, candles = candles.len(), "Evaluating new candle");
        summary.groups_evaluated += 1;

        let mut alerted = match self.retries.remove(key) {
            Some(pending) if pending.candle == evaluated_through => pending.alerted,
            _ => HashSet::new(),
        };

        let mut all_ok = true;
        let mut matches = Vec::new();
        for member in &group.members {
            summary.evaluations += 1;
            match member.evaluate(&candles) {
                Ok(result) if result.matched => {
                    info!(pair = %key, strategy = %member.name(), detail = %result.detail, "Strategy matched");
                    matches.push((member.name(), result.detail));
                }
                Ok(result) => {
                    debug!(pair = %key, strategy = %member.name(), detail = %result.detail, "No match");
                }
                Err(e) => {
                    warn!(pair = %key, strategy = %member.name(), error = %e, "Strategy evaluation failed");
                    summary.failures += 1;
                    all_ok = false;
                }
            }
        }

        // The gate only moves once the whole group has been evaluated.
        if all_ok {
            self.freshness.mark_evaluated(key.clone(), evaluated_through);
        } else {
            warn!(pair = %key, candle = %evaluated_through, "Group incomplete, will retry next tick");
        }

        for (name, detail) in matches {
            if alerted.contains(name) {
                debug!(pair = %key, strategy = %name, "Alert already sent for this candle");
                continue;
            }
            let payload = AlertPayload {
                strategy_name: name.to_string(),
                instrument: key.instrument.clone(),
                timeframe: key.timeframe,
                candle_time: evaluated_through,
                message: detail,
            };
            if let Err(e) = self.notifier.deliver(&payload).await {
                warn!(pair = %key, strategy = %name, error = %e, "Alert delivery failed");
            }
            summary.alerts += 1;
            alerted.insert(name.to_string());
        }

        if !all_ok {
            self.retries.insert(
                key.clone(),
                PendingRetry {
                    candle: evaluated_through,
                    alerted,
                },
            );
        }
    }
}
