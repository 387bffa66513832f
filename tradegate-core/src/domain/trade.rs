//! ClosedTrade — an immutable completed round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candle::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Closed by a strategy sell signal.
    Signal,
    /// Bar low breached the stop.
    StopLoss,
    /// Residual position closed at the end of a backtest.
    BacktestEnd,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::BacktestEnd => "backtest_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub market: Market,
    pub entry_price: i64,
    pub exit_price: i64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub quantity: i64,
    pub pnl: i64,
    pub exit_reason: ExitReason,
    pub strategy: String,
    pub holding_bars: usize,
}

impl ClosedTrade {
    /// Trades with zero P&L count as losses.
    pub fn is_winner(&self) -> bool {
        self.pnl > 0
    }

    /// Return on the committed notional.
    pub fn return_pct(&self) -> f64 {
        if self.quantity == 0 {
            return 0.0;
        }
        self.pnl as f64 / self.quantity as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(pnl: i64) -> ClosedTrade {
        ClosedTrade {
            symbol: "AAPL".into(),
            market: Market::Us,
            entry_price: 18_000,
            exit_price: 19_800,
            entry_time: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap(),
            quantity: 10_000,
            pnl,
            exit_reason: ExitReason::Signal,
            strategy: "meanrev".into(),
            holding_bars: 5,
        }
    }

    #[test]
    fn zero_pnl_is_not_a_winner() {
        assert!(trade(1).is_winner());
        assert!(!trade(0).is_winner());
        assert!(!trade(-5).is_winner());
    }

    #[test]
    fn return_pct_is_relative_to_notional() {
        assert!((trade(1_000).return_pct() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn exit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::StopLoss).unwrap();
        assert_eq!(json, "\"stop_loss\"");
        assert_eq!(ExitReason::BacktestEnd.as_str(), "backtest_end");
    }
}
