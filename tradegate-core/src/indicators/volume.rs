//! Volume SMA — average traded volume for relative-volume comparison.
//! Lookback: period - 1.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct VolumeSma {
    period: usize,
    name: String,
}

impl VolumeSma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume SMA period must be >= 1");
        Self {
            period,
            name: format!("volume_sma_{period}"),
        }
    }
}

impl Indicator for VolumeSma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        rolling_mean(&volumes, self.period)
    }
}
