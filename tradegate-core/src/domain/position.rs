//! Position — a simulated long holding for a single symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candle::Market;

/// At most one per symbol. `quantity` is notional in cents and `entry_price`
/// is the weighted average of every contributing fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub market: Market,
    pub entry_price: i64,
    pub quantity: i64,
    pub stop_loss: i64,
    /// Number of pyramid adds on top of the initial entry.
    pub pyramid_count: u32,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub strategy: String,
}

impl Position {
    /// Percentage-of-notional P&L at `price`: `quantity * (price - entry) / entry`.
    ///
    /// Truncates toward zero. Returns 0 for a degenerate entry price.
    pub fn pnl_at(&self, price: i64) -> i64 {
        pnl_of_notional(self.quantity, self.entry_price, price)
    }

    /// Current value of the notional at `mark`.
    pub fn market_value(&self, mark: i64) -> i64 {
        if self.entry_price <= 0 {
            return self.quantity;
        }
        (self.quantity as i128 * mark as i128 / self.entry_price as i128) as i64
    }

    pub fn stop_triggered(&self, low: i64) -> bool {
        low <= self.stop_loss
    }
}

/// `quantity * (exit - entry) / entry` in integer arithmetic, truncating toward zero.
pub fn pnl_of_notional(quantity: i64, entry: i64, exit: i64) -> i64 {
    if entry <= 0 {
        return 0;
    }
    (quantity as i128 * (exit - entry) as i128 / entry as i128) as i64
}
