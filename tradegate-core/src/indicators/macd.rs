//! MACD — Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(line, signal_period);
//! histogram = line - signal.
//! With SMA-seeded EMAs the line is defined from index slow-1 and the
//! signal/histogram from index slow+signal-2 (33 for 12/26/9).

use super::ema::ema_series;
use super::Indicator;
use crate::domain::{closes, Candle};

/// Which MACD series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

/// All three MACD series for a window.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema_series(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();
    MacdSeries {
        line,
        signal: signal_line,
        histogram,
    }
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    output: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, output: MacdLine) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        let suffix = match output {
            MacdLine::Line => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            output,
            name: format!("macd_{suffix}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdLine::Histogram)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let line = self.fast.max(self.slow) - 1;
        match self.output {
            MacdLine::Line => line,
            MacdLine::Signal | MacdLine::Histogram => line + self.signal - 1,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let series = macd(&closes(candles), self.fast, self.slow, self.signal);
        match self.output {
            MacdLine::Line => series.line,
            MacdLine::Signal => series.signal,
            MacdLine::Histogram => series.histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn histogram_defined_from_index_33() {
        let closes: Vec<i64> = (0..60).map(|i| 10_000 + (i % 7) * 15 + i * 3).collect();
        let hist = Macd::histogram(12, 26, 9).compute(&make_candles(&closes));
        assert!(hist[..33].iter().all(|v| v.is_nan()));
        assert!(hist[33..].iter().all(|v| !v.is_nan()));
        assert_eq!(Macd::histogram(12, 26, 9).lookback(), 33);
    }

    #[test]
    fn constant_prices_give_zero_macd() {
        let series = macd(&[500.0; 50], 12, 26, 9);
        for i in 33..50 {
            assert_approx(series.line[i], 0.0, 1e-9);
            assert_approx(series.histogram[i], 0.0, 1e-9);
        }
    }

    #[test]
    fn rising_prices_give_positive_line() {
        let prices: Vec<f64> = (0..60).map(|i| 1000.0 + 10.0 * i as f64).collect();
        let series = macd(&prices, 12, 26, 9);
        assert!(series.line[59] > 0.0);
    }
}
