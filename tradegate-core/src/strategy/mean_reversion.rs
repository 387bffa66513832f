//! Mean reversion — Bollinger Band extremes confirmed by RSI, for ranging markets.

use serde::{Deserialize, Serialize};

use super::{stop_below, SignalTemplate, Strategy, SymbolContext};
use crate::domain::{closes, Action, Candle, Market, Signal};
use crate::indicators::{bollinger, rsi_series, value_at, Atr, Indicator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionParams {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub atr_period: usize,
    /// Buy below the lower band only while RSI is under this level.
    pub rsi_entry: f64,
    /// Overextension sell above the upper band only while RSI is over this level.
    pub rsi_exit: f64,
    pub stop_atr_multiple: f64,
    pub min_bars: usize,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std: 2.0,
            rsi_period: 14,
            atr_period: 14,
            rsi_entry: 35.0,
            rsi_exit: 65.0,
            stop_atr_multiple: 1.5,
            min_bars: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
}

impl MeanReversion {
    pub fn new(params: MeanReversionParams) -> Self {
        Self { params }
    }
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self::new(MeanReversionParams::default())
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "meanrev"
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
        let bands = bollinger(&prices, p.bb_period, p.bb_std);
        let rsi = rsi_series(&prices, p.rsi_period);
        let atr = Atr::new(p.atr_period).compute(window);

        let last = window.len() - 1;
        let (Some(upper), Some(middle), Some(lower), Some(cur_rsi), Some(cur_atr)) = (
            value_at(&bands.upper, last),
            value_at(&bands.middle, last),
            value_at(&bands.lower, last),
            value_at(&rsi, last),
            value_at(&atr, last),
        ) else {
            return Vec::new();
        };
        let close = window[last].close;
        let prev_close = window[last - 1].close as f64;
        let close_f = close as f64;

        let tpl = SignalTemplate {
            symbol,
            market,
            strategy: self.name(),
        };
        let mut signals = Vec::new();

        if close_f < lower && cur_rsi < p.rsi_entry {
            let depth = if lower > 0.0 { (lower - close_f) / lower } else { 0.0 };
            signals.push(tpl.signal(
                Action::Buy,
                (depth * 10.0 + 0.3).min(1.0),
                close,
                stop_below(close, p.stop_atr_multiple * cur_atr),
                format!(
                    "Price ({}) below lower Bollinger Band ({:.0}), RSI oversold ({:.1})",
                    close, lower, cur_rsi
                ),
                &[
                    ("rsi", cur_rsi),
                    ("bb_lower", lower),
                    ("bb_middle", middle),
                    ("bb_upper", upper),
                    ("atr", cur_atr),
                ],
            ));
        }

        if prev_close < middle && close_f >= middle {
            signals.push(tpl.signal(
                Action::Sell,
                0.6,
                close,
                close,
                format!(
                    "Price crossed above middle Bollinger Band ({:.0}), mean reversion target hit",
                    middle
                ),
                &[("rsi", cur_rsi), ("bb_middle", middle), ("atr", cur_atr)],
            ));
        }

        if close_f > upper && cur_rsi > p.rsi_exit {
            signals.push(tpl.signal(
                Action::Sell,
                0.8,
                close,
                close,
                format!(
                    "Price ({}) above upper Bollinger Band ({:.0}), RSI elevated ({:.1})",
                    close, upper, cur_rsi
                ),
                &[("rsi", cur_rsi), ("bb_upper", upper), ("atr", cur_atr)],
            ));
        }

        signals
    }
}
