//! Indicator Library.
//!
//! Pure, deterministic functions over an ordered candle window. Every series
//! has the same length as its input; warm-up and otherwise undefined entries
//! are `f64::NAN`. Callers check `is_nan()` (or use [`value_at`]) before
//! acting on a value, so an undefined input suppresses a signal instead of
//! producing a bogus one.
//!
//! Multi-series indicators (MACD, Bollinger, Donchian) are exposed both as a
//! struct-of-series helper for strategies and as separate named `Indicator`
//! instances per band, keeping the single-series trait unchanged.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod macd;
pub mod percentile;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use bollinger::{bollinger, Bollinger, BollingerBand, BollingerSeries};
pub use donchian::{donchian, Donchian, DonchianBand, DonchianSeries};
pub use ema::{ema_series, Ema};
pub use macd::{macd, Macd, MacdLine, MacdSeries};
pub use percentile::percentile_rank;
pub use rsi::{rsi_series, Rsi};
pub use sma::{rolling_mean, Sma};
pub use volume::VolumeSma;

use crate::domain::Candle;

/// Trait for indicators.
///
/// Indicators take a full candle window and produce a numeric output series
/// of the same length. The first `lookback()` values are `f64::NAN` (warm-up).
///
/// # Look-ahead guard
/// No value at index t may depend on a candle at index t+1 or later. Every
/// indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_20").
    fn name(&self) -> &str;

    /// Number of leading undefined values.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole window.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Defined value at `index`, or `None` when out of range or undefined.
pub fn value_at(series: &[f64], index: usize) -> Option<f64> {
    series.get(index).copied().filter(|v| !v.is_nan())
}

/// Last value of a series, if defined.
pub fn last_value(series: &[f64]) -> Option<f64> {
    series.len().checked_sub(1).and_then(|i| value_at(series, i))
}

/// Create synthetic candles from close prices (cents) for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open, close) + 10, low = min(open, close) - 10, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[i64]) -> Vec<Candle> {
    let data: Vec<(i64, i64, i64, i64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 10, open.min(close) - 10, close)
        })
        .collect();
    make_ohlc_candles(&data)
}

/// Create candles from explicit (open, high, low, close) tuples, hourly spaced.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(i64, i64, i64, i64)]) -> Vec<Candle> {
    use crate::domain::{Market, Timeframe};
    use chrono::TimeZone;

    let base = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            symbol: "TEST".to_string(),
            market: Market::Crypto,
            timeframe: Timeframe::Hour1,
            timestamp: base + chrono::Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_filters_undefined() {
        let series = [f64::NAN, 1.5, f64::NAN];
        assert_eq!(value_at(&series, 0), None);
        assert_eq!(value_at(&series, 1), Some(1.5));
        assert_eq!(value_at(&series, 7), None);
        assert_eq!(last_value(&series), None);
        assert_eq!(last_value(&[]), None);
    }
}
