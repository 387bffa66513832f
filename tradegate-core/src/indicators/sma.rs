//! Simple Moving Average (SMA).
//!
//! SMA[t] = mean(close[t-period+1..=t]).
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::{closes, Candle};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        rolling_mean(&closes(candles), self.period)
    }
}

/// Trailing mean over exactly `period` values; NaN inside the window yields NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}
