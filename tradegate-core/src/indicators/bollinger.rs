//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper/Lower: middle +/- mult * stddev(close, period)
//! - Bandwidth: (upper - lower) / middle, undefined when middle == 0
//!
//! Uses the sample standard deviation (divide by N-1).
//! Lookback: period - 1.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::{closes, Candle};

/// Which Bollinger series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Bandwidth,
}

#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub bandwidth: Vec<f64>,
}

pub fn bollinger(prices: &[f64], period: usize, multiplier: f64) -> BollingerSeries {
    let n = prices.len();
    let middle = rolling_mean(prices, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    let mut bandwidth = vec![f64::NAN; n];

    if period < 2 {
        return BollingerSeries {
            upper,
            middle,
            lower,
            bandwidth,
        };
    }

    for i in 0..n {
        let mean = middle[i];
        if mean.is_nan() {
            continue;
        }
        let window = &prices[i + 1 - period..=i];
        let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        let sd = variance.sqrt();
        upper[i] = mean + multiplier * sd;
        lower[i] = mean - multiplier * sd;
        if mean != 0.0 {
            bandwidth[i] = (upper[i] - lower[i]) / mean;
        }
    }

    BollingerSeries {
        upper,
        middle,
        lower,
        bandwidth,
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    fn with_band(period: usize, multiplier: f64, band: BollingerBand, label: &str) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Upper, "upper")
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Middle, "middle")
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Lower, "lower")
    }

    pub fn bandwidth(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Bandwidth, "bandwidth")
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let series = bollinger(&closes(candles), self.period, self.multiplier);
        match self.band {
            BollingerBand::Upper => series.upper,
            BollingerBand::Middle => series.middle,
            BollingerBand::Lower => series.lower,
            BollingerBand::Bandwidth => series.bandwidth,
        }
    }
}
