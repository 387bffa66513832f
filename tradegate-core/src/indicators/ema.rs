//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1).
//! Seed: SMA of the first `period` defined values.
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::{closes, Candle};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        ema_series(&closes(candles), self.period)
    }
}

/// EMA over a series that may begin with undefined values (e.g. a MACD line).
///
/// The seed window starts at the first defined value; a later NaN ends the output.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    if n - start < period {
        return result;
    }

    let seed_window = &values[start..start + period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    let seed_idx = start + period - 1;
    result[seed_idx] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in (seed_idx + 1)..n {
        if values[i].is_nan() {
            return result;
        }
        let next = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = next;
        prev = next;
    }
    result
}
