//! Position sizing — risk a fixed share of equity per trade.
//!
//! # Formula
//! ```text
//! risk_budget   = equity * risk_pct
//! stop_distance = |price - stop|            (fallback: 2·ATR, then price/20)
//! quantity      = risk_budget * price / stop_distance
//! ```
//! Quantity is notional in cents, capped at `max_position` and floored at
//! `min_position`.
//!
//! # Example
//! - Equity 1,000,000, risk 1% → budget 10,000
//! - Price 10,000, stop 9,500 → distance 500 (5%)
//! - Quantity 10,000 * 10,000 / 500 = 200,000 → capped at max_position

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Signal};
use crate::indicators::{last_value, Atr, Indicator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskBudgetSizer {
    /// Fraction of equity at risk per trade (0.01 = 1%).
    pub risk_pct: f64,
    pub max_position: i64,
    pub min_position: i64,
    pub atr_period: usize,
    /// ATR multiple used when a signal carries no stop distance.
    pub atr_fallback_multiple: f64,
}

impl Default for RiskBudgetSizer {
    fn default() -> Self {
        Self {
            risk_pct: 0.01,
            max_position: 10_000,
            min_position: 100,
            atr_period: 14,
            atr_fallback_multiple: 2.0,
        }
    }
}

impl RiskBudgetSizer {
    /// Notional for `signal` given current `equity`. `window` supplies the ATR fallback.
    pub fn quantity(&self, signal: &Signal, window: &[Candle], equity: i64) -> i64 {
        let budget = self.risk_budget(equity);
        let price = signal.price;
        let stop_distance = self.stop_distance(signal, window);

        let quantity = if price > 0 {
            (budget as i128 * price as i128 / stop_distance as i128) as i64
        } else {
            budget
        };
        quantity.min(self.max_position).max(self.min_position)
    }

    /// Attach the sized quantity to a buy signal. Sells pass through unchanged.
    pub fn apply(&self, mut signal: Signal, window: &[Candle], equity: i64) -> Signal {
        if !signal.is_buy() {
            return signal;
        }
        let quantity = self.quantity(&signal, window, equity);
        signal.quantity = Some(quantity);
        signal
            .indicator_data
            .insert("risk_budget_cents".to_string(), self.risk_budget(equity) as f64);
        signal
    }

    pub fn risk_budget(&self, equity: i64) -> i64 {
        (equity as f64 * self.risk_pct) as i64
    }

    fn stop_distance(&self, signal: &Signal, window: &[Candle]) -> i64 {
        let price = signal.price;
        let mut distance = (price - signal.stop_loss).abs();
        if distance <= 0 {
            let atr = Atr::new(self.atr_period).compute(window);
            distance = match last_value(&atr) {
                Some(n) => (n * self.atr_fallback_multiple) as i64,
                None => price / 20,
            };
        }
        if distance <= 0 {
            distance = (price / 20).max(1);
        }
        distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Market};
    use crate::indicators::make_candles;
    use std::collections::BTreeMap;

    fn buy(price: i64, stop: i64) -> Signal {
        Signal {
            symbol: "BTC".into(),
            market: Market::Crypto,
            action: Action::Buy,
            strength: 0.7,
            price,
            stop_loss: stop,
            strategy_name: "turtle_crypto".into(),
            reason: "test".into(),
            indicator_data: BTreeMap::new(),
            quantity: None,
        }
    }

    fn uncapped() -> RiskBudgetSizer {
        RiskBudgetSizer {
            max_position: i64::MAX,
            ..RiskBudgetSizer::default()
        }
    }

    #[test]
    fn quantity_scales_with_stop_distance() {
        // budget 10,000; distance 5% → 200,000 notional
        let q = uncapped().quantity(&buy(10_000, 9_500), &[], 1_000_000);
        assert_eq!(q, 200_000);
    }

    #[test]
    fn quantity_capped_and_floored() {
        let sizer = RiskBudgetSizer::default();
        assert_eq!(sizer.quantity(&buy(10_000, 9_500), &[], 1_000_000), 10_000);
        // Tiny equity: 1% of 500 = 5 → 5 * 10,000 / 5,000 = 10 → floored to 100
        assert_eq!(sizer.quantity(&buy(10_000, 5_000), &[], 500), 100);
    }

    #[test]
    fn zero_stop_distance_falls_back_to_atr() {
        let window = make_candles(&[1_000; 20]);
        // make_candles pads 10 each side → TR 20 → ATR 20 → distance 40
        let q = uncapped().quantity(&buy(1_000, 1_000), &window, 100_000);
        assert_eq!(q, 1_000 * 1_000 / 40);
    }

    #[test]
    fn zero_stop_distance_without_atr_uses_five_percent() {
        let q = uncapped().quantity(&buy(1_000, 1_000), &[], 100_000);
        assert_eq!(q, 1_000 * 1_000 / 50);
    }

    #[test]
    fn apply_only_sizes_buys() {
        let sizer = RiskBudgetSizer::default();
        let sized = sizer.apply(buy(10_000, 9_500), &[], 1_000_000);
        assert_eq!(sized.quantity, Some(10_000));
        assert_eq!(sized.indicator_data["risk_budget_cents"], 10_000.0);

        let mut sell = buy(10_000, 10_000);
        sell.action = Action::Sell;
        assert_eq!(sizer.apply(sell, &[], 1_000_000).quantity, None);
    }
}
