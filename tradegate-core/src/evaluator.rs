//! Live signal evaluator: one candle window in, at most one sized signal out.
//!
//! Mirrors a single step of the backtest loop for callers that hold live data
//! (a scheduler or a manual "evaluate now" action). The caller owns the
//! per-symbol [`SymbolContext`] and passes it back on every call.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{select_strongest, Candle, Market, Signal};
use crate::regime::{classify_with, Regime, RegimeThresholds, MIN_REGIME_BARS};
use crate::sizing::RiskBudgetSizer;
use crate::strategy::{StrategyKind, StrategyParams, SymbolContext};

/// Outcome of one evaluation. `signal` is `None` for a hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub symbol: String,
    pub market: Market,
    pub regime: Option<Regime>,
    pub strategy: Option<StrategyKind>,
    pub signal: Option<Signal>,
    /// Human-readable account of the decision.
    pub reason: String,
}

impl Evaluation {
    pub fn is_hold(&self) -> bool {
        self.signal.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    params: StrategyParams,
    sizer: RiskBudgetSizer,
    thresholds: RegimeThresholds,
    /// Bypass regime selection and always use this strategy.
    fixed: Option<StrategyKind>,
}

impl SignalEvaluator {
    pub fn new(params: StrategyParams, sizer: RiskBudgetSizer) -> Self {
        Self {
            params,
            sizer,
            ..Self::default()
        }
    }

    pub fn with_thresholds(mut self, thresholds: RegimeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_fixed_strategy(mut self, kind: StrategyKind) -> Self {
        self.fixed = Some(kind);
        self
    }

    /// Classify, pick a strategy, generate, select the strongest and size it.
    pub fn evaluate_symbol(
        &self,
        window: &[Candle],
        symbol: &str,
        market: Market,
        ctx: &mut SymbolContext,
        equity: i64,
    ) -> Evaluation {
        if window.len() < MIN_REGIME_BARS {
            debug!(symbol, bars = window.len(), "insufficient data, skipping");
            return Evaluation {
                symbol: symbol.to_string(),
                market,
                regime: None,
                strategy: None,
                signal: None,
                reason: format!(
                    "Insufficient data: {} bars (need {MIN_REGIME_BARS})",
                    window.len()
                ),
            };
        }

        let regime = classify_with(window, &self.thresholds);
        let kind = self.fixed.unwrap_or_else(|| StrategyKind::for_regime(regime));
        let strategy = kind.build(&self.params);
        info!(symbol, %regime, strategy = kind.name(), "evaluating");

        let signals = strategy.generate_signals(window, symbol, market, ctx);
        let signal = select_strongest(&signals)
            .cloned()
            .map(|s| self.sizer.apply(s, window, equity));

        let reason = match &signal {
            Some(s) => format!("{} {} ({}): {}", s.action, symbol, kind, s.reason),
            None => format!("hold {symbol}: no {kind} signal in {regime} regime"),
        };

        Evaluation {
            symbol: symbol.to_string(),
            market,
            regime: Some(regime),
            strategy: Some(kind),
            signal,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use crate::indicators::make_candles;

    fn oscillating_then_drop() -> Vec<Candle> {
        let mut closes: Vec<i64> = (0..60)
            .map(|i| 10_000 + (400.0 * 0.93_f64.powi(i) * (1.3 * i as f64).sin()).round() as i64)
            .collect();
        closes.push(9_700);
        make_candles(&closes)
    }

    #[test]
    fn short_window_reports_insufficient_data() {
        let candles = make_candles(&[10_000; 20]);
        let eval = SignalEvaluator::default().evaluate_symbol(
            &candles,
            "BTC",
            Market::Crypto,
            &mut SymbolContext::default(),
            1_000_000,
        );
        assert!(eval.is_hold());
        assert!(eval.regime.is_none());
        assert!(eval.reason.contains("Insufficient data"));
    }

    #[test]
    fn volatile_window_routes_to_mean_reversion_and_sizes() {
        let candles = oscillating_then_drop();
        let eval = SignalEvaluator::default().evaluate_symbol(
            &candles,
            "BTC",
            Market::Crypto,
            &mut SymbolContext::default(),
            1_000_000,
        );
        assert_eq!(eval.regime, Some(Regime::Volatile));
        assert_eq!(eval.strategy, Some(StrategyKind::MeanReversion));
        let signal = eval.signal.expect("mean reversion buy");
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.price, 9_700);
        assert_eq!(signal.quantity, Some(10_000));
        assert!(signal.indicator_data.contains_key("risk_budget_cents"));
    }

    #[test]
    fn flat_window_holds() {
        let candles = make_candles(&[10_000; 40]);
        let eval = SignalEvaluator::default()
            .with_fixed_strategy(StrategyKind::TurtleCrypto)
            .evaluate_symbol(
                &candles,
                "ETH",
                Market::Crypto,
                &mut SymbolContext::default(),
                1_000_000,
            );
        assert!(eval.is_hold());
        assert_eq!(eval.strategy, Some(StrategyKind::TurtleCrypto));
        assert!(eval.reason.starts_with("hold ETH"));
    }
}
