//! Signal — a strategy's buy/sell recommendation for one evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::candle::Market;
use super::order::{Order, OrderSide, OrderType};

/// Direction of a strategy recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("buy"),
            Action::Sell => f.write_str("sell"),
        }
    }
}

/// Default notional (cents) used when a signal carries no sized quantity.
pub const DEFAULT_SIGNAL_QUANTITY: i64 = 100;

/// Ephemeral output of a strategy evaluation.
///
/// `price` and `stop_loss` are integer cents. `strength` lies in [0, 1] and is
/// the tie-break key when several signals are produced for one bar.
/// `indicator_data` records the indicator values that justified the signal so
/// a decision can be reproduced without consulting logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub market: Market,
    pub action: Action,
    pub strength: f64,
    pub price: i64,
    pub stop_loss: i64,
    pub strategy_name: String,
    pub reason: String,
    #[serde(default)]
    pub indicator_data: BTreeMap<String, f64>,
    /// Notional in cents, filled in by position sizing.
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl Signal {
    pub fn is_buy(&self) -> bool {
        self.action == Action::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == Action::Sell
    }

    /// Sized quantity, or the default notional when sizing has not run.
    pub fn quantity_or_default(&self) -> i64 {
        self.quantity.unwrap_or(DEFAULT_SIGNAL_QUANTITY)
    }

    /// Build the Risk Gate input for this signal as a market order.
    pub fn to_order(&self) -> Order {
        let side = match self.action {
            Action::Buy => OrderSide::Buy,
            Action::Sell => OrderSide::Sell,
        };
        Order {
            symbol: self.symbol.clone(),
            market: self.market,
            side,
            order_type: OrderType::Market,
            quantity: self.quantity_or_default(),
            price: self.price,
            stop_loss: self.stop_loss,
            strategy: self.strategy_name.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Pick the strongest signal. Ties keep the earliest signal in the list.
pub fn select_strongest(signals: &[Signal]) -> Option<&Signal> {
    signals.iter().fold(None, |best: Option<&Signal>, s| match best {
        Some(b) if b.strength >= s.strength => Some(b),
        _ => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(action: Action, strength: f64, reason: &str) -> Signal {
        Signal {
            symbol: "ETH".into(),
            market: Market::Crypto,
            action,
            strength,
            price: 250_000,
            stop_loss: 240_000,
            strategy_name: "momentum".into(),
            reason: reason.into(),
            indicator_data: BTreeMap::new(),
            quantity: None,
        }
    }

    #[test]
    fn strongest_prefers_higher_strength() {
        let signals = vec![
            signal(Action::Buy, 0.4, "a"),
            signal(Action::Sell, 0.9, "b"),
            signal(Action::Buy, 0.7, "c"),
        ];
        assert_eq!(select_strongest(&signals).unwrap().reason, "b");
    }

    #[test]
    fn strongest_tie_keeps_first() {
        let signals = vec![signal(Action::Buy, 0.7, "first"), signal(Action::Sell, 0.7, "second")];
        assert_eq!(select_strongest(&signals).unwrap().reason, "first");
    }

    #[test]
    fn strongest_of_nothing_is_none() {
        assert!(select_strongest(&[]).is_none());
    }

    #[test]
    fn to_order_uses_default_quantity() {
        let order = signal(Action::Buy, 0.5, "x").to_order();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.quantity, DEFAULT_SIGNAL_QUANTITY);
        assert_eq!(order.stop_loss, 240_000);
        assert_eq!(order.order_type, OrderType::Market);
    }

    #[test]
    fn to_order_uses_sized_quantity() {
        let mut s = signal(Action::Sell, 0.5, "x");
        s.quantity = Some(4_200);
        let order = s.to_order();
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.quantity, 4_200);
    }
}
