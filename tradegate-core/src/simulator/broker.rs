//! Bar-by-bar position simulator.
//!
//! Per bar, in order:
//! 1. stop-loss check against the bar low (fills at the stop, ignores any signal)
//! 2. sell signal closes a held position at the signal price
//! 3. buy signal opens a position, or pyramids into a held one
//! 4. equity snapshot at the bar close
//!
//! `quantity` is currency notional, so P&L is
//! `quantity * (exit_fill - entry) / entry` and closing returns
//! `quantity + pnl` to cash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fees::FeeSchedule;
use crate::domain::{Action, Candle, ClosedTrade, ExitReason, Market, Position, Signal};

/// How a pyramid add treats the existing stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PyramidStopPolicy {
    /// Overwrite with the incoming signal's stop, even if lower.
    #[default]
    Replace,
    /// Keep the higher of the two stops.
    TightenOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub starting_cash: i64,
    pub max_position_size: i64,
    pub min_position_size: i64,
    /// Bars that must elapse after a close before a new entry.
    pub cooldown_bars: usize,
    pub fees: FeeSchedule,
    pub pyramid_stop: PyramidStopPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            starting_cash: 1_000_000,
            max_position_size: 10_000,
            min_position_size: 100,
            cooldown_bars: 0,
            fees: FeeSchedule::default(),
            pyramid_stop: PyramidStopPolicy::Replace,
        }
    }
}

/// Equity snapshot taken at every processed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: i64,
    pub cash: i64,
}

/// Everything a finished simulation hands to the metrics layer.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_fees: i64,
    pub final_cash: i64,
}

#[derive(Debug, Clone)]
pub struct PositionSimulator {
    config: SimulatorConfig,
    cash: i64,
    position: Option<Position>,
    closed_trades: Vec<ClosedTrade>,
    equity_curve: Vec<EquityPoint>,
    total_fees: i64,
    last_close_bar: Option<usize>,
}

impl PositionSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            cash: config.starting_cash,
            config,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            total_fees: 0,
            last_close_bar: None,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn cash(&self) -> i64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Append-only record of completed round trips.
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn total_fees(&self) -> i64 {
        self.total_fees
    }

    /// Cash plus the held notional marked to `mark`.
    pub fn equity(&self, mark: i64) -> i64 {
        match &self.position {
            Some(pos) => self.cash + pos.market_value(mark),
            None => self.cash,
        }
    }

    /// Process one bar. `pyramiding` enables adds to a held position on buy.
    pub fn process_bar(
        &mut self,
        signal: Option<&Signal>,
        bar: &Candle,
        index: usize,
        pyramiding: bool,
    ) {
        if let Some(stop) = self
            .position
            .as_ref()
            .filter(|p| p.stop_triggered(bar.low))
            .map(|p| p.stop_loss)
        {
            debug!(symbol = %bar.symbol, index, stop, low = bar.low, "stop-loss hit");
            self.close_position(stop, bar.timestamp, index, ExitReason::StopLoss);
        }

        if let Some(signal) = signal {
            match (signal.action, self.position.is_some()) {
                (Action::Sell, true) => {
                    self.close_position(signal.price, bar.timestamp, index, ExitReason::Signal);
                }
                (Action::Buy, false) => self.open_position(signal, bar.timestamp, index),
                (Action::Buy, true) if pyramiding => self.pyramid(signal),
                _ => {}
            }
        }

        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.equity(bar.close),
            cash: self.cash,
        });
    }

    /// Close any residual position, e.g. at the end of a backtest.
    pub fn force_close(&mut self, price: i64, time: DateTime<Utc>, index: usize) {
        if self.position.is_some() {
            self.close_position(price, time, index, ExitReason::BacktestEnd);
        }
    }

    pub fn finish(self) -> SimulationOutput {
        SimulationOutput {
            closed_trades: self.closed_trades,
            equity_curve: self.equity_curve,
            total_fees: self.total_fees,
            final_cash: self.cash,
        }
    }

    fn in_cooldown(&self, index: usize) -> bool {
        match self.last_close_bar {
            Some(last) => index.saturating_sub(last) < self.config.cooldown_bars,
            None => false,
        }
    }

    fn open_position(&mut self, signal: &Signal, time: DateTime<Utc>, index: usize) {
        if self.in_cooldown(index) {
            debug!(symbol = %signal.symbol, index, "entry skipped during cooldown");
            return;
        }

        let market = signal.market;
        let quantity = signal
            .quantity_or_default()
            .min(self.config.max_position_size)
            .min(self.cash);
        if quantity < self.config.min_position_size {
            debug!(symbol = %signal.symbol, quantity, "entry below minimum position size");
            return;
        }

        let fill = self.config.fees.entry_fill(market, signal.price);
        self.cash -= quantity;
        self.total_fees += self.config.fees.fee_on(market, quantity);
        self.position = Some(Position {
            symbol: signal.symbol.clone(),
            market,
            entry_price: fill,
            quantity,
            stop_loss: signal.stop_loss,
            pyramid_count: 0,
            entry_time: time,
            entry_bar: index,
            strategy: signal.strategy_name.clone(),
        });
        debug!(symbol = %signal.symbol, fill, quantity, stop = signal.stop_loss, "position opened");
    }

    fn pyramid(&mut self, signal: &Signal) {
        let Some(pos) = self.position.as_mut() else {
            return;
        };
        let add = signal.quantity_or_default().min(self.config.max_position_size);
        if add < self.config.min_position_size || add > self.cash {
            debug!(symbol = %signal.symbol, add, cash = self.cash, "pyramid add skipped");
            return;
        }

        let fill = self.config.fees.entry_fill(pos.market, signal.price);
        let total = pos.quantity + add;
        let notional = pos.entry_price as i128 * pos.quantity as i128 + fill as i128 * add as i128;
        pos.entry_price = (notional / total as i128) as i64;
        pos.quantity = total;
        pos.stop_loss = match self.config.pyramid_stop {
            PyramidStopPolicy::Replace => signal.stop_loss,
            PyramidStopPolicy::TightenOnly => pos.stop_loss.max(signal.stop_loss),
        };
        pos.pyramid_count += 1;

        self.cash -= add;
        self.total_fees += self.config.fees.fee_on(pos.market, add);
        debug!(
            symbol = %signal.symbol,
            add,
            entry = pos.entry_price,
            stop = pos.stop_loss,
            level = pos.pyramid_count,
            "pyramid add"
        );
    }

    fn close_position(
        &mut self,
        price: i64,
        time: DateTime<Utc>,
        index: usize,
        reason: ExitReason,
    ) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let market: Market = pos.market;
        let fill = self.config.fees.exit_fill(market, price);
        let pnl = pos.pnl_at(fill);

        self.cash += pos.quantity + pnl;
        self.total_fees += self.config.fees.fee_on(market, pos.quantity);
        self.last_close_bar = Some(index);

        debug!(symbol = %pos.symbol, fill, pnl, reason = reason.as_str(), "position closed");
        self.closed_trades.push(ClosedTrade {
            symbol: pos.symbol,
            market,
            entry_price: pos.entry_price,
            exit_price: fill,
            entry_time: pos.entry_time,
            exit_time: time,
            quantity: pos.quantity,
            pnl,
            exit_reason: reason,
            strategy: pos.strategy,
            holding_bars: index.saturating_sub(pos.entry_bar),
        });
    }
}
