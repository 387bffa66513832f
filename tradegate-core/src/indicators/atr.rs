//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period), seeded with the mean of the
//! first `period` true ranges.
//! Lookback: period (TR[0] has no previous close and is excluded).

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series from candles.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        let h = c.high as f64;
        let l = c.low as f64;
        if i == 0 {
            tr.push(h - l);
            continue;
        }
        let pc = candles[i - 1].close as f64;
        tr.push((h - l).max((h - pc).abs()).max((l - pc).abs()));
    }
    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
///
/// Seed: mean of the first run of `period` consecutive defined values.
/// A NaN after the seed poisons the rest of the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    let seed_start = (0..=n - period).find(|&i| values[i..i + period].iter().all(|v| !v.is_nan()));
    let Some(seed_start) = seed_start else {
        return result;
    };
    let seed_end = seed_start + period;

    let seed: f64 = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;

    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut tr = true_range(candles);
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_candles, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let candles = make_ohlc_candles(&[
            (100, 105, 95, 102),  // TR = 10
            (102, 108, 100, 106), // TR = max(8, 6, 2) = 8
            (106, 107, 98, 99),   // TR = max(9, 1, 8) = 9
        ]);
        let tr = true_range(&candles);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let candles = make_ohlc_candles(&[(98, 102, 97, 100), (110, 115, 108, 112)]);
        let tr = true_range(&candles);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let candles = make_ohlc_candles(&[
            (100, 105, 95, 102),  // TR = 10 (excluded)
            (102, 108, 100, 106), // TR = 8
            (106, 107, 98, 99),   // TR = 9
            (99, 103, 97, 101),   // TR = 6
            (101, 106, 100, 105), // TR = 6
        ]);
        let result = Atr::new(3).compute(&candles);

        assert!(result[..3].iter().all(|v| v.is_nan()));
        // Seed over TR[1..=3] = [8, 9, 6]
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_skips_leading_nan() {
        let values = [f64::NAN, f64::NAN, 2.0, 4.0, 6.0, 6.0];
        let result = wilder_smooth(&values, 2);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 4.5, DEFAULT_EPSILON);
        assert_approx(result[5], 5.25, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_smooth_short_input_is_undefined() {
        assert!(wilder_smooth(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }
}
