use common::{Candle, DetectionResult, Direction};

/// Value of 1 pip. Adjust per instrument through the strategy config.
pub const PIP_SIZE: f64 = 0.01;

/// Support/resistance breakout.
///
/// Levels come from reversal pairs in every candle but the last: a bear
/// candle followed by a bull candle marks its close as support, a bull
/// followed by a bear marks resistance. The last candle breaks out when it
/// closes more than one pip beyond the lowest level of either kind. Distances
/// are measured in whole quoted pips, not raw floating-point differences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrBreakoutDetector {
    /// Candles used to build levels. The breakout candle comes on top.
    pub lookback: usize,
    pub pip_size: f64,
}

impl Default for SrBreakoutDetector {
    fn default() -> Self {
        Self {
            lookback: 50,
            pip_size: PIP_SIZE,
        }
    }
}

/// Consolidated levels found in a candle history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Levels {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

impl SrBreakoutDetector {
    pub fn new(lookback: usize, pip_size: f64) -> Self {
        Self { lookback, pip_size }
    }

    pub fn min_candles(&self) -> usize {
        self.lookback + 1
    }

    /// Scan consecutive pairs for reversal levels and keep the minimum of each
    /// side. The minimum resistance keeps the breakout threshold close to
    /// where price was actually turned back.
    pub fn levels(&self, history: &[Candle]) -> Levels {
        history
            .windows(2)
            .fold(Levels::default(), |mut levels, pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                match (prev.direction(), curr.direction()) {
                    (Direction::Bear, Direction::Bull) => {
                        levels.support = Some(lowest(levels.support, prev.close));
                    }
                    (Direction::Bull, Direction::Bear) => {
                        levels.resistance = Some(lowest(levels.resistance, prev.close));
                    }
                    _ => {}
                }
                levels
            })
    }

    pub fn check(&self, candles: &[Candle]) -> DetectionResult {
        if candles.len() < self.min_candles() {
            return DetectionResult::miss("insufficient data");
        }
        let Some((breakout, history)) = candles.split_last() else {
            return DetectionResult::miss("insufficient data");
        };

        let levels = self.levels(history);
        let close = breakout.close;

        if let Some(resistance) = levels.resistance {
            if self.pips_between(resistance, close) > 1.0 {
                return DetectionResult::hit(format!(
                    "RESISTANCE breakout at R={resistance:.5} (close={close:.5})"
                ));
            }
        }
        if let Some(support) = levels.support {
            if self.pips_between(close, support) > 1.0 {
                return DetectionResult::hit(format!(
                    "SUPPORT breakout at S={support:.5} (close={close:.5})"
                ));
            }
        }

        DetectionResult::miss("no breakout found")
    }
}

/// Resolution of breakout distances, in fractions of a pip.
const PIP_FRACTIONS: f64 = 1e6;

impl SrBreakoutDetector {
    /// Signed distance `to - from` in pips, snapped to a millionth of a pip
    /// so that a quoted price exactly one pip away compares as 1.0.
    fn pips_between(&self, from: f64, to: f64) -> f64 {
        ((to - from) / self.pip_size * PIP_FRACTIONS).round() / PIP_FRACTIONS
    }
}

fn lowest(current: Option<f64>, candidate: f64) -> f64 {
    current.map_or(candidate, |level| level.min(candidate))
}
