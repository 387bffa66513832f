//! Per-market one-way fee rates, applied as a spread on entry and exit.

use serde::{Deserialize, Serialize};

use crate::domain::Market;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub crypto: f64,
    pub asx: f64,
    pub us: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            crypto: 0.004,
            asx: 0.001,
            us: 0.001,
        }
    }
}

impl FeeSchedule {
    /// No fees anywhere. Handy for exact-arithmetic tests.
    pub fn zero() -> Self {
        Self {
            crypto: 0.0,
            asx: 0.0,
            us: 0.0,
        }
    }

    pub fn rate(&self, market: Market) -> f64 {
        match market {
            Market::Crypto => self.crypto,
            Market::Asx => self.asx,
            Market::Us => self.us,
        }
    }

    /// Buying pays the spread: `price * (1 + rate)`, truncated.
    pub fn entry_fill(&self, market: Market, price: i64) -> i64 {
        (price as f64 * (1.0 + self.rate(market))) as i64
    }

    /// Selling gives up the spread: `price * (1 - rate)`, truncated.
    pub fn exit_fill(&self, market: Market, price: i64) -> i64 {
        (price as f64 * (1.0 - self.rate(market))) as i64
    }

    /// Fee charged on a notional.
    pub fn fee_on(&self, market: Market, notional: i64) -> i64 {
        (notional as f64 * self.rate(market)) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rates() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.rate(Market::Crypto), 0.004);
        assert_eq!(fees.rate(Market::Asx), 0.001);
        assert_eq!(fees.rate(Market::Us), 0.001);
    }

    #[test]
    fn fills_straddle_the_quote() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.entry_fill(Market::Crypto, 10_000), 10_040);
        assert_eq!(fees.exit_fill(Market::Crypto, 10_000), 9_960);
        assert_eq!(fees.fee_on(Market::Us, 10_000), 10);
    }
}
