use common::{Candle, DetectionResult, Direction};

/// Engulfing reversal: three same-direction candles followed by a larger
/// candle in the opposite direction.
///
/// Looks only at the last four candles of the window, most recent last.
/// Every rule must hold; the first one that fails names itself in the
/// result's detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngulfingDetector;

impl EngulfingDetector {
    pub const MIN_CANDLES: usize = 4;
    /// Requested bar count: two spare bars absorb a still-forming candle.
    pub const REQUIRED_CANDLES: usize = 6;

    pub fn check(&self, candles: &[Candle]) -> DetectionResult {
        let [.., c4, c3, c2, c1] = candles else {
            return DetectionResult::miss("insufficient data");
        };

        let (dir_4, dir_3, dir_2) = (c4.direction(), c3.direction(), c2.direction());
        if [dir_4, dir_3, dir_2].contains(&Direction::Doji) {
            return DetectionResult::miss("doji in lookback window");
        }
        if !(dir_4 == dir_3 && dir_3 == dir_2) {
            return DetectionResult::miss(format!(
                "direction mismatch ({dir_4}, {dir_3}, {dir_2})"
            ));
        }

        let dir_1 = c1.direction();
        if dir_1 == Direction::Doji {
            return DetectionResult::miss("latest candle is a doji");
        }
        if dir_1 == dir_2 {
            return DetectionResult::miss(format!(
                "latest candle does not reverse the run ({dir_1})"
            ));
        }

        let (body_1, body_2) = (c1.body(), c2.body());
        if body_1 <= body_2 {
            return DetectionResult::miss(format!(
                "latest body does not engulf prior body ({body_1:.5} <= {body_2:.5})"
            ));
        }

        DetectionResult::hit(format!("Engulfing pattern found ({dir_1} signal)"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    /// Candles from (open, close) pairs, oldest first, one hour apart.
    fn series(bodies: &[(f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        bodies
            .iter()
            .enumerate()
            .map(|(i, &(open, close))| Candle {
                open,
                high: open.max(close) + 0.1,
                low: open.min(close) - 0.1,
                close,
                timestamp: start + Duration::hours(i as i64),
                complete: true,
            })
            .collect()
    }

    #[test]
    fn bearish_engulfing_after_three_bulls() {
        let candles = series(&[(10.0, 11.0), (11.0, 12.0), (12.0, 13.0), (13.0, 11.5)]);
        let result = EngulfingDetector.check(&candles);
        assert!(result.matched, "{}", result.detail);
        assert!(result.detail.contains("BEAR"));
    }

    #[test]
    fn bullish_engulfing_after_three_bears() {
        let candles = series(&[(13.0, 12.0), (12.0, 11.0), (11.0, 10.5), (10.5, 12.0)]);
        let result = EngulfingDetector.check(&candles);
        assert!(result.matched);
        assert!(result.detail.contains("BULL"));
    }

    #[test]
    fn smaller_reversal_body_does_not_match() {
        let candles = series(&[(10.0, 11.0), (11.0, 12.0), (12.0, 13.0), (13.0, 12.5)]);
        let result = EngulfingDetector.check(&candles);
        assert!(!result.matched);
        assert!(result.detail.contains("does not engulf"));
    }

    #[test]
    fn equal_body_does_not_match() {
        let candles = series(&[(10.0, 11.0), (11.0, 12.0), (12.0, 13.0), (13.0, 12.0)]);
        assert!(!EngulfingDetector.check(&candles).matched);
    }

    #[test]
    fn each_rule_has_its_own_diagnostic() {
        let doji_in_run = series(&[(10.0, 10.0), (11.0, 12.0), (12.0, 13.0), (13.0, 11.0)]);
        assert_eq!(
            EngulfingDetector.check(&doji_in_run).detail,
            "doji in lookback window"
        );

        let mixed_run = series(&[(10.0, 9.0), (11.0, 12.0), (12.0, 13.0), (13.0, 11.0)]);
        assert!(EngulfingDetector.check(&mixed_run).detail.starts_with("direction mismatch"));

        let doji_last = series(&[(10.0, 11.0), (11.0, 12.0), (12.0, 13.0), (13.0, 13.0)]);
        assert_eq!(
            EngulfingDetector.check(&doji_last).detail,
            "latest candle is a doji"
        );

        let continuation = series(&[(10.0, 11.0), (11.0, 12.0), (12.0, 13.0), (13.0, 16.0)]);
        assert!(EngulfingDetector
            .check(&continuation)
            .detail
            .starts_with("latest candle does not reverse"));
    }

    #[test]
    fn only_the_last_four_candles_matter() {
        let candles = series(&[
            (20.0, 19.0),
            (20.0, 20.0),
            (10.0, 11.0),
            (11.0, 12.0),
            (12.0, 13.0),
            (13.0, 11.5),
        ]);
        assert!(EngulfingDetector.check(&candles).matched);
    }

    #[test]
    fn short_input_fails_closed() {
        for n in 0..EngulfingDetector::MIN_CANDLES {
            let candles = series(&vec![(1.0, 2.0); n]);
            let result = EngulfingDetector.check(&candles);
            assert!(!result.matched);
            assert_eq!(result.detail, "insufficient data");
        }
    }
}
