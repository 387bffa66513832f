//! Backtest result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradegate_core::domain::{ClosedTrade, Market, Timeframe};
use tradegate_core::simulator::EquityPoint;

use crate::config::RunId;
use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of a single backtest run. Money fields are cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    /// Fixed strategy name, or `"auto"` for regime switching.
    pub strategy_name: String,
    pub symbol: String,
    pub market: Market,
    pub timeframe: Timeframe,
    /// Timestamp of the first evaluated bar (after warm-up).
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub bars_processed: usize,
    /// BLAKE3 over the candle series the run consumed.
    #[serde(default)]
    pub dataset_hash: String,
    pub starting_cash: i64,
    pub ending_cash: i64,
    pub ending_equity: i64,
    pub total_fees: i64,
    pub metrics: PerformanceMetrics,
    /// Number of times auto mode changed strategy.
    #[serde(default)]
    pub regime_switches: usize,
    /// Buy orders the Risk Gate turned away.
    #[serde(default)]
    pub risk_rejections: usize,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    /// Copy with ratios rounded to their published precision: two decimals
    /// for percentages, Sharpe and profit factor; one decimal for win rate and
    /// average holding length. Cents are already exact.
    pub fn rounded(&self) -> Self {
        let m = &self.metrics;
        Self {
            metrics: PerformanceMetrics {
                total_return_pct: round_to(m.total_return_pct, 2),
                annualized_return_pct: round_to(m.annualized_return_pct, 2),
                sharpe_ratio: round_to(m.sharpe_ratio, 2),
                max_drawdown_pct: round_to(m.max_drawdown_pct, 2),
                win_rate_pct: round_to(m.win_rate_pct, 1),
                profit_factor: round_to(m.profit_factor, 2),
                avg_holding_bars: round_to(m.avg_holding_bars, 1),
                ..m.clone()
            },
            ..self.clone()
        }
    }

    /// Number of closed round trips.
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_precision() {
        assert_eq!(round_to(12.345_678, 2), 12.35);
        assert_eq!(round_to(-3.14159, 2), -3.14);
        assert_eq!(round_to(66.666_666, 1), 66.7);
        assert_eq!(round_to(0.0, 2), 0.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }
}
