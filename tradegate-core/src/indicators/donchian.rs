//! Donchian Channel — highest high / lowest low over a lookback window.
//!
//! - Upper: max(high[t-period+1..=t])
//! - Lower: min(low[t-period+1..=t])
//! - Middle: (upper + lower) / 2
//!
//! Breakout detection must use [`DonchianSeries::shifted`], which moves every
//! value forward one bar so index t only sees candles before t.
//! Lookback: period - 1 (period when shifted).

use super::Indicator;
use crate::domain::Candle;

/// Which band of the Donchian channel to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
    Middle,
}

#[derive(Debug, Clone)]
pub struct DonchianSeries {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub middle: Vec<f64>,
}

impl DonchianSeries {
    /// Channel computed from prior bars only: value[t] = raw[t-1], value[0] = NaN.
    pub fn shifted(self) -> Self {
        Self {
            upper: shift_one(self.upper),
            lower: shift_one(self.lower),
            middle: shift_one(self.middle),
        }
    }
}

fn shift_one(mut series: Vec<f64>) -> Vec<f64> {
    if !series.is_empty() {
        series.pop();
        series.insert(0, f64::NAN);
    }
    series
}

pub fn donchian(candles: &[Candle], period: usize) -> DonchianSeries {
    let n = candles.len();
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    let mut middle = vec![f64::NAN; n];

    if period == 0 || n < period {
        return DonchianSeries { upper, lower, middle };
    }

    for i in (period - 1)..n {
        let window = &candles[i + 1 - period..=i];
        let hi = window.iter().map(|c| c.high).max().unwrap_or_default() as f64;
        let lo = window.iter().map(|c| c.low).min().unwrap_or_default() as f64;
        upper[i] = hi;
        lower[i] = lo;
        middle[i] = (hi + lo) / 2.0;
    }

    DonchianSeries { upper, lower, middle }
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    shifted: bool,
    name: String,
}

impl Donchian {
    fn with_band(period: usize, band: DonchianBand, label: &str) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band,
            shifted: false,
            name: format!("donchian_{label}_{period}"),
        }
    }

    pub fn upper(period: usize) -> Self {
        Self::with_band(period, DonchianBand::Upper, "upper")
    }

    pub fn lower(period: usize) -> Self {
        Self::with_band(period, DonchianBand::Lower, "lower")
    }

    pub fn middle(period: usize) -> Self {
        Self::with_band(period, DonchianBand::Middle, "middle")
    }

    /// Same band, computed from prior bars only.
    pub fn prior(mut self) -> Self {
        self.shifted = true;
        self.name = format!("{}_prior", self.name);
        self
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        if self.shifted {
            self.period
        } else {
            self.period.saturating_sub(1)
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut series = donchian(candles, self.period);
        if self.shifted {
            series = series.shifted();
        }
        match self.band {
            DonchianBand::Upper => series.upper,
            DonchianBand::Lower => series.lower,
            DonchianBand::Middle => series.middle,
        }
    }
}
