//! ADX — Average Directional Index (Wilder).
//!
//! 1. +DM / -DM from consecutive highs and lows
//! 2. Wilder-smooth +DM and -DM, normalise by ATR(period)
//! 3. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 4. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period - 1 (DI defined from `period`, ADX seeded `period` DX values later).

use super::atr::{wilder_smooth, Atr};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        if n < 2 {
            return vec![f64::NAN; n];
        }

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = (candles[i].high - candles[i - 1].high) as f64;
            let down = (candles[i - 1].low - candles[i].low) as f64;
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        let atr = Atr::new(self.period).compute(candles);
        let smooth_plus = wilder_smooth(&plus_dm, self.period);
        let smooth_minus = wilder_smooth(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            if atr[i].is_nan()
                || smooth_plus[i].is_nan()
                || smooth_minus[i].is_nan()
                || atr[i] == 0.0
            {
                continue;
            }
            let plus_di = 100.0 * smooth_plus[i] / atr[i];
            let minus_di = 100.0 * smooth_minus[i] / atr[i];
            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        wilder_smooth(&dx, self.period)
    }
}
