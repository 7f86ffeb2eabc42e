use std::collections::HashMap;

use chrono::{DateTime, Utc};

use common::PairKey;

/// What the tracker knows about one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Unseen,
    /// Last candle that went through a complete, error-free group pass.
    SeenAt(DateTime<Utc>),
}

/// Remembers, per instrument and timeframe, the last candle that was fully
/// evaluated, so a minute-by-minute poll evaluates each candle once.
///
/// Process-local: two processes watching the same pair will both alert.
#[derive(Debug, Default)]
pub struct FreshnessTracker {
    seen: HashMap<PairKey, DateTime<Utc>>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &PairKey) -> Freshness {
        match self.seen.get(key) {
            Some(&t) => Freshness::SeenAt(t),
            None => Freshness::Unseen,
        }
    }

    /// True when `observed` differs from the cached timestamp, or the pair has
    /// never been evaluated.
    pub fn is_new(&self, key: &PairKey, observed: DateTime<Utc>) -> bool {
        self.state(key) != Freshness::SeenAt(observed)
    }

    /// Record a completed pass through the candle at `evaluated_through`.
    pub fn mark_evaluated(&mut self, key: PairKey, evaluated_through: DateTime<Utc>) {
        self.seen.insert(key, evaluated_through);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use common::Timeframe;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn unseen_key_is_always_new() {
        let tracker = FreshnessTracker::new();
        let key = PairKey::new("XAU_USD", Timeframe::H1);
        assert_eq!(tracker.state(&key), Freshness::Unseen);
        assert!(tracker.is_new(&key, at(9)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn same_timestamp_is_not_new_after_marking() {
        let mut tracker = FreshnessTracker::new();
        let key = PairKey::new("XAU_USD", Timeframe::H1);
        tracker.mark_evaluated(key.clone(), at(9));

        assert_eq!(tracker.state(&key), Freshness::SeenAt(at(9)));
        assert!(!tracker.is_new(&key, at(9)));
        assert!(tracker.is_new(&key, at(10)));
    }

    #[test]
    fn keys_are_independent() {
        let mut tracker = FreshnessTracker::new();
        tracker.mark_evaluated(PairKey::new("XAU_USD", Timeframe::H1), at(9));

        assert!(tracker.is_new(&PairKey::new("XAU_USD", Timeframe::M15), at(9)));
        assert!(tracker.is_new(&PairKey::new("EUR_USD", Timeframe::H1), at(9)));
        assert_eq!(tracker.len(), 1);
    }
}
