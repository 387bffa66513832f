//! Momentum — RSI recovery plus MACD histogram flip, for trending markets.
//!
//! Buy: RSI crosses up through the oversold level on the same bar the MACD
//! histogram flips from <= 0 to > 0. Stop at price - 2·ATR.
//! Sell: RSI overbought, or the histogram flips from >= 0 to < 0.

use serde::{Deserialize, Serialize};

use super::{stop_below, SignalTemplate, Strategy, SymbolContext};
use crate::domain::{closes, Action, Candle, Market, Signal};
use crate::indicators::{macd, rsi_series, value_at, Atr, Indicator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stop_atr_multiple: f64,
    pub min_bars: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stop_atr_multiple: 2.0,
            min_bars: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Momentum {
    params: MomentumParams,
}

impl Momentum {
    pub fn new(params: MomentumParams) -> Self {
        Self { params }
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Self::new(MomentumParams::default())
    }
}

impl Strategy for Momentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn min_bars(&self) -> usize {
        self.params.min_bars
    }

    fn generate_signals(
        &self,
        window: &[Candle],
        symbol: &str,
        market: Market,
        _ctx: &mut SymbolContext,
    ) -> Vec<Signal> {
        let p = &self.params;
        if window.len() < p.min_bars.max(2) {
            return Vec::new();
        }

        let prices = closes(window);
        let rsi = rsi_series(&prices, p.rsi_period);
        let hist = macd(&prices, p.macd_fast, p.macd_slow, p.macd_signal).histogram;
        let atr = Atr::new(p.atr_period).compute(window);

        let last = window.len() - 1;
        let (Some(cur_rsi), Some(cur_hist), Some(cur_atr)) =
            (value_at(&rsi, last), value_at(&hist, last), value_at(&atr, last))
        else {
            return Vec::new();
        };
        let prev_rsi = value_at(&rsi, last - 1);
        let prev_hist = value_at(&hist, last - 1);
        let price = window[last].close;

        let tpl = SignalTemplate {
            symbol,
            market,
            strategy: self.name(),
        };
        let data = [("rsi", cur_rsi), ("macd_hist", cur_hist), ("atr", cur_atr)];
        let mut signals = Vec::new();

        let rsi_recovered =
            prev_rsi.is_some_and(|r| r < p.rsi_oversold) && cur_rsi >= p.rsi_oversold;
        let hist_turned_up = prev_hist.is_some_and(|h| h <= 0.0) && cur_hist > 0.0;
        if rsi_recovered && hist_turned_up {
            let strength = if cur_atr > 0.0 {
                (cur_hist / cur_atr).abs().min(1.0)
            } else {
                0.5
            };
            signals.push(tpl.signal(
                Action::Buy,
                strength,
                price,
                stop_below(price, p.stop_atr_multiple * cur_atr),
                format!(
                    "RSI crossed above {:.0} ({:.1}), MACD histogram turned positive ({:.0})",
                    p.rsi_oversold, cur_rsi, cur_hist
                ),
                &data,
            ));
        }

        let overbought = cur_rsi > p.rsi_overbought;
        let hist_turned_down = prev_hist.is_some_and(|h| h >= 0.0) && cur_hist < 0.0;
        if overbought || hist_turned_down {
            let mut reasons = Vec::new();
            if overbought {
                reasons.push(format!("RSI overbought ({cur_rsi:.1})"));
            }
            if hist_turned_down {
                reasons.push(format!("MACD histogram turned negative ({cur_hist:.0})"));
            }
            signals.push(tpl.signal(
                Action::Sell,
                (cur_rsi / 100.0).min(1.0),
                price,
                price,
                reasons.join(", "),
                &data,
            ));
        }

        signals
    }
}
