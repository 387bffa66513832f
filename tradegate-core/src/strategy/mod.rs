//! Strategy Variants — polymorphic "produce signals from a candle window".
//!
//! Each variant is an independent type behind the [`Strategy`] trait. The
//! orchestrator picks one by name or regime through [`StrategyKind`]; there is
//! no inheritance chain. Per-symbol session state (Turtle pyramid tracking)
//! lives in a caller-owned [`SymbolContext`], so one strategy instance can
//! serve any number of symbols.

mod mean_reversion;
mod momentum;
mod turtle;

pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use momentum::{Momentum, MomentumParams};
pub use turtle::{Turtle, TurtleParams};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Action, Candle, Market, Signal};
use crate::regime::Regime;

/// Per-symbol strategy session state, owned and threaded by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolContext {
    /// Entries taken in the current Turtle campaign (initial entry counts as 1).
    pub pyramid_count: u32,
    /// Close of the most recent Turtle entry or pyramid add, in cents.
    pub last_entry_price: i64,
}

impl SymbolContext {
    pub fn reset(&mut self) {
        self.pyramid_count = 0;
        self.last_entry_price = 0;
    }
}

/// Trait for signal-producing strategies.
///
/// # Look-ahead invariant
/// `window` ends at the bar being evaluated. Implementations read only
/// `window` and never index past its end.
pub trait Strategy: Send + Sync {
    /// Registry name (e.g., "momentum", "turtle_crypto").
    fn name(&self) -> &str;

    /// Minimum window length; shorter windows produce no signals.
    fn min_bars(&self) -> usize;

    /// Whether a buy while holding a position is a pyramid add.
    fn supports_pyramiding(&self) -> bool {
        false
    }

    /// Evaluate the last bar of `window`. Returns an empty list on insufficient
    /// data or undefined indicator values.
    fn generate_signals(
        &self,
        window: &[Candle],
        symbol: &str,
        market: Market,
        ctx: &mut SymbolContext,
    ) -> Vec<Signal>;
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}' (expected momentum, meanrev, turtle_crypto or turtle_stocks)")]
    Unknown(String),
}

/// Lookup table entry for the available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "momentum")]
    Momentum,
    #[serde(rename = "meanrev")]
    MeanReversion,
    #[serde(rename = "turtle_crypto")]
    TurtleCrypto,
    #[serde(rename = "turtle_stocks")]
    TurtleStocks,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::TurtleCrypto,
        StrategyKind::TurtleStocks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "meanrev",
            StrategyKind::TurtleCrypto => "turtle_crypto",
            StrategyKind::TurtleStocks => "turtle_stocks",
        }
    }

    /// Trending markets get momentum; everything else mean reversion.
    pub fn for_regime(regime: Regime) -> Self {
        match regime {
            Regime::Trending => StrategyKind::Momentum,
            Regime::Ranging | Regime::Volatile => StrategyKind::MeanReversion,
        }
    }

    /// Turtle parameterization matching a market.
    pub fn turtle_for(market: Market) -> Self {
        match market {
            Market::Crypto => StrategyKind::TurtleCrypto,
            Market::Asx | Market::Us => StrategyKind::TurtleStocks,
        }
    }

    pub fn build(&self, params: &StrategyParams) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Momentum => Box::new(Momentum::new(params.momentum.clone())),
            StrategyKind::MeanReversion => Box::new(MeanReversion::new(params.meanrev.clone())),
            StrategyKind::TurtleCrypto => {
                Box::new(Turtle::new("turtle_crypto", params.turtle_crypto.clone()))
            }
            StrategyKind::TurtleStocks => {
                Box::new(Turtle::new("turtle_stocks", params.turtle_stocks.clone()))
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| StrategyError::Unknown(s.to_string()))
    }
}

/// Parameters for every strategy variant.
///
/// Momentum and mean-reversion tables may be partial. A Turtle table, when
/// present, must be complete since the two parameterizations differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub momentum: MomentumParams,
    pub meanrev: MeanReversionParams,
    pub turtle_crypto: TurtleParams,
    pub turtle_stocks: TurtleParams,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            momentum: MomentumParams::default(),
            meanrev: MeanReversionParams::default(),
            turtle_crypto: TurtleParams::crypto(),
            turtle_stocks: TurtleParams::stocks(),
        }
    }
}

/// Shared fields of every signal a strategy emits for one evaluation.
pub(crate) struct SignalTemplate<'a> {
    pub symbol: &'a str,
    pub market: Market,
    pub strategy: &'a str,
}

impl SignalTemplate<'_> {
    pub fn signal(
        &self,
        action: Action,
        strength: f64,
        price: i64,
        stop_loss: i64,
        reason: String,
        data: &[(&str, f64)],
    ) -> Signal {
        Signal {
            symbol: self.symbol.to_string(),
            market: self.market,
            action,
            strength,
            price,
            stop_loss,
            strategy_name: self.strategy.to_string(),
            reason,
            indicator_data: data
                .iter()
                .map(|(k, v)| (k.to_string(), round2(*v)))
                .collect::<BTreeMap<_, _>>(),
            quantity: None,
        }
    }
}

/// Long stop `distance` below `price`, truncated toward zero and floored at 1 cent.
pub(crate) fn stop_below(price: i64, distance: f64) -> i64 {
    ((price as f64 - distance) as i64).max(1)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_name() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("scalper".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn regime_lookup() {
        assert_eq!(StrategyKind::for_regime(Regime::Trending), StrategyKind::Momentum);
        assert_eq!(StrategyKind::for_regime(Regime::Ranging), StrategyKind::MeanReversion);
        assert_eq!(StrategyKind::for_regime(Regime::Volatile), StrategyKind::MeanReversion);
    }

    #[test]
    fn built_strategies_report_their_names() {
        let params = StrategyParams::default();
        for kind in StrategyKind::ALL {
            assert_eq!(kind.build(&params).name(), kind.name());
        }
        assert!(StrategyKind::TurtleStocks.build(&params).supports_pyramiding());
        assert!(!StrategyKind::Momentum.build(&params).supports_pyramiding());
    }

    #[test]
    fn turtle_for_market() {
        assert_eq!(StrategyKind::turtle_for(Market::Crypto), StrategyKind::TurtleCrypto);
        assert_eq!(StrategyKind::turtle_for(Market::Asx), StrategyKind::TurtleStocks);
    }

    #[test]
    fn stop_below_floors_at_one_cent() {
        assert_eq!(stop_below(10_000, 250.7), 9_749);
        assert_eq!(stop_below(100, 500.0), 1);
    }

    #[test]
    fn params_deserialize_partially() {
        let params: StrategyParams =
            serde_json::from_str(r#"{"momentum": {"rsi_period": 10}}"#).unwrap();
        assert_eq!(params.momentum.rsi_period, 10);
        assert_eq!(params.momentum.macd_slow, 26);
        assert_eq!(params.turtle_crypto, TurtleParams::crypto());
        assert_eq!(params.turtle_stocks, TurtleParams::stocks());
    }

    #[test]
    fn partial_turtle_table_is_rejected() {
        let result: Result<StrategyParams, _> =
            serde_json::from_str(r#"{"turtle_crypto": {"entry_period": 10}}"#);
        assert!(result.is_err());
    }
}
