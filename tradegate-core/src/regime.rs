//! Regime Classifier — labels a candle window trending, ranging or volatile.
//!
//! Inputs are the latest ADX(14) and the percentile rank of the latest
//! Bollinger bandwidth within the window's own bandwidth history.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{closes, Candle};
use crate::indicators::{bollinger, last_value, percentile_rank, Adx, Indicator};

/// Minimum window length for a meaningful classification.
pub const MIN_REGIME_BARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Trending => "trending",
            Regime::Ranging => "ranging",
            Regime::Volatile => "volatile",
        };
        f.write_str(s)
    }
}

/// Classification thresholds. Comparisons are strict on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    pub adx_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub adx_trending: f64,
    pub adx_ranging: f64,
    pub bandwidth_pct_high: f64,
    pub bandwidth_pct_low: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            adx_period: 14,
            bollinger_period: 20,
            bollinger_std: 2.0,
            adx_trending: 25.0,
            adx_ranging: 20.0,
            bandwidth_pct_high: 60.0,
            bandwidth_pct_low: 40.0,
        }
    }
}

/// Classify with default thresholds.
pub fn classify(window: &[Candle]) -> Regime {
    classify_with(window, &RegimeThresholds::default())
}

/// Classify the latest bar of `window`. Undefined inputs fall through to `Volatile`.
pub fn classify_with(window: &[Candle], t: &RegimeThresholds) -> Regime {
    if window.len() < MIN_REGIME_BARS {
        tracing::debug!(
            bars = window.len(),
            "not enough data for regime detection, defaulting to volatile"
        );
        return Regime::Volatile;
    }

    let adx = Adx::new(t.adx_period).compute(window);
    let bands = bollinger(&closes(window), t.bollinger_period, t.bollinger_std);

    let (Some(adx), Some(_)) = (last_value(&adx), last_value(&bands.bandwidth)) else {
        return Regime::Volatile;
    };
    let bw_pct = percentile_rank(&bands.bandwidth);

    if adx > t.adx_trending && bw_pct > t.bandwidth_pct_high {
        Regime::Trending
    } else if adx < t.adx_ranging && bw_pct < t.bandwidth_pct_low {
        Regime::Ranging
    } else {
        Regime::Volatile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn short_window_is_volatile() {
        let closes: Vec<i64> = (0..29).map(|i| 10_000 + i * 100).collect();
        assert_eq!(classify(&make_candles(&closes)), Regime::Volatile);
    }

    #[test]
    fn breakout_after_flat_base_is_trending() {
        // 40 flat bars then a steady climb: ADX high, bandwidth near its widest.
        let closes: Vec<i64> = (0..60)
            .map(|i| if i < 40 { 10_000 } else { 10_000 + (i - 39) * 100 })
            .collect();
        assert_eq!(classify(&make_candles(&closes)), Regime::Trending);
    }

    #[test]
    fn damped_oscillation_is_ranging() {
        let closes: Vec<i64> = (0..60)
            .map(|i| 10_000 + (400.0 * 0.93f64.powi(i) * (i as f64 * 1.3).sin()).round() as i64)
            .collect();
        assert_eq!(classify(&make_candles(&closes)), Regime::Ranging);
    }

    #[test]
    fn flat_window_is_not_trending() {
        // ADX undefined-or-low, bandwidth constant: never trending.
        let regime = classify(&make_candles(&[10_000; 60]));
        assert_ne!(regime, Regime::Trending);
    }

    #[test]
    fn regime_display() {
        assert_eq!(Regime::Ranging.to_string(), "ranging");
        assert_eq!(serde_json::to_string(&Regime::Trending).unwrap(), "\"trending\"");
    }
}
