//! Turtle breakout — Donchian channel breakouts with ATR ("N") stops and pyramiding.
//!
//! System 1 breaks the short entry channel, System 2 the long one. Channels
//! come from prior bars only. Pyramid adds fire every `pyramid_atr_step`·N of
//! favourable movement above the last entry, up to `max_pyramids` entries.

use serde::{Deserialize, Serialize};

use super::{stop_below, SignalTemplate, Strategy, SymbolContext};
use crate::domain::{Action, Candle, Market, Signal};
use crate::indicators::{donchian, value_at, Atr, Indicator};

/// All fields are required when deserialized; use [`TurtleParams::crypto`] or
/// [`TurtleParams::stocks`] for the standard parameterizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurtleParams {
    pub entry_period: usize,
    pub long_entry_period: usize,
    pub exit_period: usize,
    pub atr_period: usize,
    pub stop_multiplier: f64,
    pub pyramid_atr_step: f64,
    pub max_pyramids: u32,
}

impl TurtleParams {
    /// Shorter channels and wider stops for 24/7 crypto markets.
    pub fn crypto() -> Self {
        Self {
            entry_period: 15,
            long_entry_period: 40,
            exit_period: 8,
            atr_period: 20,
            stop_multiplier: 2.5,
            pyramid_atr_step: 0.5,
            max_pyramids: 3,
        }
    }

    /// Classic 20/55 rules for daily stock bars.
    pub fn stocks() -> Self {
        Self {
            entry_period: 20,
            long_entry_period: 55,
            exit_period: 10,
            atr_period: 20,
            stop_multiplier: 2.0,
            pyramid_atr_step: 0.5,
            max_pyramids: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Turtle {
    name: String,
    params: TurtleParams,
}

impl Turtle {
    pub fn new(name: impl Into<String>, params: TurtleParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn crypto() -> Self {
        Self::new("turtle_crypto", TurtleParams::crypto())
    }

    pub fn stocks() -> Self {
        Self::new("turtle_stocks", TurtleParams::stocks())
    }

    pub fn params(&self) -> &TurtleParams {
        &self.params
    }
}

impl Strategy for Turtle {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars(&self) -> usize {
        let p = &self.params;
        p.entry_period.max(p.long_entry_period).max(p.atr_period) + 5
    }

    fn supports_pyramiding(&self) -> bool {
        true
    }

    fn generate_signals(
        &self,
        window: &[Candle],
        symbol: &str,
        market: Market,
        ctx: &mut SymbolContext,
    ) -> Vec<Signal> {
        let p = &self.params;
        if window.len() < self.min_bars().max(2) {
            return Vec::new();
        }

        let entry = donchian(window, p.entry_period).shifted();
        let long = donchian(window, p.long_entry_period).shifted();
        let exit = donchian(window, p.exit_period).shifted();
        let atr = Atr::new(p.atr_period).compute(window);

        let last = window.len() - 1;
        let (Some(entry_upper), Some(long_upper), Some(exit_lower), Some(n)) = (
            value_at(&entry.upper, last),
            value_at(&long.upper, last),
            value_at(&exit.lower, last),
            value_at(&atr, last),
        ) else {
            return Vec::new();
        };
        let entry_upper = entry_upper as i64;
        let long_upper = long_upper as i64;
        let exit_lower = exit_lower as i64;
        let close = window[last].close;
        let prev_close = window[last - 1].close;

        let tpl = SignalTemplate {
            symbol,
            market,
            strategy: &self.name,
        };
        let mut signals = Vec::new();

        if close <= exit_lower {
            signals.push(tpl.signal(
                Action::Sell,
                0.8,
                close,
                close,
                format!(
                    "Turtle exit: close {close} <= exit channel {exit_lower} ({}-bar low)",
                    p.exit_period
                ),
                &[("exit_channel_lower", exit_lower as f64), ("atr", n)],
            ));
            ctx.reset();
            return signals;
        }

        let system1 = close > entry_upper && prev_close <= entry_upper;
        let system2 = close > long_upper && prev_close <= long_upper;

        if (system1 || system2) && ctx.pyramid_count == 0 {
            let (label, channel, strength) = if system2 {
                ("System 2", long_upper, 0.9)
            } else {
                ("System 1", entry_upper, 0.7)
            };
            signals.push(tpl.signal(
                Action::Buy,
                strength,
                close,
                stop_below(close, p.stop_multiplier * n),
                format!("Turtle {label} breakout: close {close} > channel high {channel}"),
                &[
                    ("entry_channel_upper", entry_upper as f64),
                    ("long_channel_upper", long_upper as f64),
                    ("atr", n),
                    ("pyramid_level", 1.0),
                    ("system", if system2 { 2.0 } else { 1.0 }),
                ],
            ));
            ctx.pyramid_count = 1;
            ctx.last_entry_price = close;
        }

        if ctx.pyramid_count > 0 && ctx.pyramid_count < p.max_pyramids {
            let threshold = ctx.last_entry_price + (p.pyramid_atr_step * n) as i64;
            if close >= threshold {
                let level = ctx.pyramid_count + 1;
                signals.push(tpl.signal(
                    Action::Buy,
                    0.5,
                    close,
                    stop_below(close, p.stop_multiplier * n),
                    format!(
                        "Turtle pyramid #{}: close {} >= threshold {} (last entry + {}N)",
                        level, close, threshold, p.pyramid_atr_step
                    ),
                    &[
                        ("entry_channel_upper", entry_upper as f64),
                        ("atr", n),
                        ("pyramid_level", level as f64),
                        ("pyramid_threshold", threshold as f64),
                    ],
                ));
                ctx.pyramid_count = level;
                ctx.last_entry_price = close;
            }
        }

        signals
    }
}
