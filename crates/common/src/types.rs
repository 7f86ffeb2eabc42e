use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A completed (or still-forming) price bar as delivered by the data source.
/// Prices are OANDA midpoint values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Bar open time as reported by the broker.
    pub timestamp: DateTime<Utc>,
    /// False for the bar that is still forming. Detectors must never see one.
    pub complete: bool,
}

impl Candle {
    pub fn direction(&self) -> Direction {
        if self.close > self.open {
            Direction::Bull
        } else if self.close < self.open {
            Direction::Bear
        } else {
            Direction::Doji
        }
    }

    /// Absolute size of the open-to-close move.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Direction of a single candle's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bull,
    Bear,
    Doji,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Bull => write!(f, "BULL"),
            Direction::Bear => write!(f, "BEAR"),
            Direction::Doji => write!(f, "DOJI"),
        }
    }
}

/// Candle granularity, using OANDA's codes (`M5`, `H1`, `D`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    S5,
    S10,
    S15,
    S30,
    M1,
    M2,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D,
    W,
    /// Monthly.
    M,
}

impl Timeframe {
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::S5 => "S5",
            Timeframe::S10 => "S10",
            Timeframe::S15 => "S15",
            Timeframe::S30 => "S30",
            Timeframe::M1 => "M1",
            Timeframe::M2 => "M2",
            Timeframe::M4 => "M4",
            Timeframe::M5 => "M5",
            Timeframe::M10 => "M10",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H2 => "H2",
            Timeframe::H3 => "H3",
            Timeframe::H4 => "H4",
            Timeframe::H6 => "H6",
            Timeframe::H8 => "H8",
            Timeframe::H12 => "H12",
            Timeframe::D => "D",
            Timeframe::W => "W",
            Timeframe::M => "M",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tf = match s.trim().to_uppercase().as_str() {
            "S5" => Timeframe::S5,
            "S10" => Timeframe::S10,
            "S15" => Timeframe::S15,
            "S30" => Timeframe::S30,
            "M1" => Timeframe::M1,
            "M2" => Timeframe::M2,
            "M4" => Timeframe::M4,
            "M5" => Timeframe::M5,
            "M10" => Timeframe::M10,
            "M15" => Timeframe::M15,
            "M30" => Timeframe::M30,
            "H1" => Timeframe::H1,
            "H2" => Timeframe::H2,
            "H3" => Timeframe::H3,
            "H4" => Timeframe::H4,
            "H6" => Timeframe::H6,
            "H8" => Timeframe::H8,
            "H12" => Timeframe::H12,
            "D" => Timeframe::D,
            "W" => Timeframe::W,
            "M" => Timeframe::M,
            other => return Err(Error::Config(format!("unknown timeframe '{other}'"))),
        };
        Ok(tf)
    }
}

/// Identifies one live-scan group: every strategy watching the same
/// instrument on the same timeframe shares a single fetch and freshness entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub instrument: String,
    pub timeframe: Timeframe,
}

impl PairKey {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.instrument, self.timeframe)
    }
}

/// Outcome of running one detector over one candle window.
///
/// `detail` doubles as the negative diagnostic and the alert body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub matched: bool,
    pub detail: String,
}

impl DetectionResult {
    pub fn hit(detail: impl Into<String>) -> Self {
        Self {
            matched: true,
            detail: detail.into(),
        }
    }

    pub fn miss(detail: impl Into<String>) -> Self {
        Self {
            matched: false,
            detail: detail.into(),
        }
    }
}

/// Outbound alert. Built by the scanner, never by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertPayload {
    pub strategy_name: String,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub candle_time: DateTime<Utc>,
    pub message: String,
}

/// OANDA account environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OandaEnv {
    #[default]
    Practice,
    Live,
}

impl OandaEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            OandaEnv::Practice => "https://api-fxpractice.oanda.com",
            OandaEnv::Live => "https://api-fxtrade.oanda.com",
        }
    }
}

impl std::fmt::Display for OandaEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OandaEnv::Practice => write!(f, "practice"),
            OandaEnv::Live => write!(f, "live"),
        }
    }
}

/// Parse a CLI date: either a bare `YYYY-MM-DD` (midnight UTC) or a full
/// RFC 3339 instant such as `2024-01-15T10:30:00Z`.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            Error::Config(format!(
                "invalid date '{s}': expected YYYY-MM-DD or an RFC 3339 instant"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            complete: true,
        }
    }

    #[test]
    fn direction_classification() {
        assert_eq!(candle(1.0, 2.0).direction(), Direction::Bull);
        assert_eq!(candle(2.0, 1.0).direction(), Direction::Bear);
        assert_eq!(candle(1.5, 1.5).direction(), Direction::Doji);
        assert_eq!(candle(2.0, 1.25).body(), 0.75);
    }

    #[test]
    fn timeframe_round_trips_through_codes() {
        for code in ["M1", "m15", "H4", "D", "M"] {
            let tf: Timeframe = code.parse().unwrap();
            assert_eq!(tf.code(), code.to_uppercase());
        }
        assert!("H5".parse::<Timeframe>().is_err());
    }

    #[test]
    fn parse_instant_accepts_date_and_rfc3339() {
        let day = parse_instant("2024-01-15").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());

        let instant = parse_instant("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());

        assert!(matches!(parse_instant("15/01/2024"), Err(Error::Config(_))));
    }

    #[test]
    fn alert_payload_rejects_unknown_fields() {
        let json = r#"{
            "strategy_name": "Engulfing",
            "instrument": "XAU_USD",
            "timeframe": "H1",
            "candle_time": "2024-01-15T10:00:00Z",
            "message": "x",
            "extra": 1
        }"#;
        assert!(serde_json::from_str::<AlertPayload>(json).is_err());
    }
}
