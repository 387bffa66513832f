//! Order and RiskVerdict — the Risk Gate's input and output.

use serde::{Deserialize, Serialize};

use super::candle::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// A proposed trade. `quantity` is notional in cents; `stop_loss` must be positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub market: Market,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: i64,
    pub stop_loss: i64,
    pub strategy: String,
    pub reason: String,
}

/// Outcome of a Risk Gate evaluation. A rejection is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub approved: bool,
    pub reason: String,
    #[serde(default)]
    pub adjusted_quantity: Option<i64>,
}

impl RiskVerdict {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
            adjusted_quantity: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            adjusted_quantity: None,
        }
    }
}
