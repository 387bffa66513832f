//! Candle — the fundamental market data unit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market a symbol trades on. Drives the fee schedule and Turtle parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Crypto,
    Asx,
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Crypto => "crypto",
            Market::Asx => "asx",
            Market::Us => "us",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crypto" => Ok(Market::Crypto),
            "asx" => Ok(Market::Asx),
            "us" => Ok(Market::Us),
            other => Err(format!("unknown market '{other}' (expected crypto, asx or us)")),
        }
    }
}

/// Bar duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Timeframe {
    /// Annualization factor used by Sharpe and annualized return.
    pub fn bars_per_year(&self) -> f64 {
        match self {
            Timeframe::Hour1 => 8760.0,
            Timeframe::Hour4 => 2190.0,
            Timeframe::Day1 => 365.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Timeframe::Hour1),
            "4h" => Ok(Timeframe::Hour4),
            "1d" => Ok(Timeframe::Day1),
            other => Err(format!("unknown timeframe '{other}' (expected 1h, 4h or 1d)")),
        }
    }
}

/// OHLCV candle for a single symbol and time bucket.
///
/// Prices are integer minor-currency units (cents). Candle sequences are
/// ordered ascending by timestamp and unique per (symbol, timeframe, timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub market: Market,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: f64,
}

impl Candle {
    /// Basic OHLC sanity check: high is the top of the bar, low the bottom, prices positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0
            && self.volume >= 0.0
    }
}

/// Extract close prices as floats for indicator math.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle {
            symbol: "BTC".into(),
            market: Market::Crypto,
            timeframe: Timeframe::Hour1,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            open: 10_000,
            high: 10_500,
            low: 9_800,
            close: 10_300,
            volume: 12.5,
        }
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_detects_inverted_range() {
        let mut c = sample_candle();
        c.high = 9_700;
        assert!(!c.is_sane());
    }

    #[test]
    fn timeframe_parses_and_annualizes() {
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::Hour4);
        assert_eq!(Timeframe::Hour1.bars_per_year(), 8760.0);
        assert_eq!(Timeframe::Day1.bars_per_year(), 365.0);
        assert!("15m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn market_serializes_lowercase() {
        let json = serde_json::to_string(&Market::Asx).unwrap();
        assert_eq!(json, "\"asx\"");
        assert_eq!("US".parse::<Market>().unwrap(), Market::Us);
    }
}
