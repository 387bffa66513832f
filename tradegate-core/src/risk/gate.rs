//! The gate: order evaluation, trade-result recording and manual controls.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use super::state::{RiskLimits, RiskState, RiskStatus};
use super::store::{RiskStateStore, StoreError};
use crate::domain::{Order, RiskVerdict};

/// Evaluates every order against portfolio risk rules.
///
/// State transitions:
/// - normal → circuit-paused after `circuit_breaker_losses` consecutive losses;
///   reverts automatically once the pause elapses, clearing the loss counter
/// - normal / circuit-paused → halted on kill switch or daily drawdown breach
/// - halted → normal only through [`RiskGate::reset_halt`]
///
/// Each call is one read-modify-write cycle against the store, serialised by
/// an internal mutex. Callers in other processes sharing a file store must
/// serialise among themselves.
pub struct RiskGate<S> {
    store: S,
    limits: RiskLimits,
    lock: Mutex<()>,
}

impl<S: RiskStateStore> RiskGate<S> {
    pub fn new(store: S, limits: RiskLimits) -> Self {
        Self {
            store,
            limits,
            lock: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn transact<T>(&self, f: impl FnOnce(&mut RiskState) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut state = self.store.get_state()?;
        let out = f(&mut state);
        self.store.save_state(&state)?;
        Ok(out)
    }

    /// Approve or reject `order` at wall-clock (or bar) time `now`.
    ///
    /// Rejections are values. Only store failures surface as errors.
    pub fn evaluate(&self, order: &Order, now: DateTime<Utc>) -> Result<RiskVerdict, StoreError> {
        let limits = &self.limits;
        self.transact(|state| {
            if state.halted {
                return RiskVerdict::reject(format!("Trading halted: {}", state.halt_reason));
            }

            if let Some(remaining) = pause_remaining(state, now) {
                return RiskVerdict::reject(format!(
                    "Trading paused: circuit breaker active, resuming in {}m",
                    remaining.num_minutes()
                ));
            }

            let max_daily_loss = pct_of(state.portfolio_value, limits.max_daily_drawdown_pct);
            if state.daily_pnl < 0 && state.daily_pnl.abs() >= max_daily_loss {
                state.halted = true;
                state.halt_reason = format!(
                    "Daily drawdown limit hit: {} cents (max {} cents)",
                    state.daily_pnl, max_daily_loss
                );
                error!(
                    daily_pnl = state.daily_pnl,
                    max_daily_loss,
                    "daily drawdown breached, trading halted"
                );
                return RiskVerdict::reject(state.halt_reason.clone());
            }

            if order.stop_loss <= 0 {
                return RiskVerdict::reject("Order rejected: stop-loss is mandatory");
            }

            if order.quantity > limits.max_position_size {
                return RiskVerdict::reject(format!(
                    "Position size {} cents exceeds max {} cents",
                    order.quantity, limits.max_position_size
                ));
            }

            let risk = per_trade_risk(order);
            let max_risk = pct_of(state.portfolio_value, limits.max_per_trade_risk_pct);
            if risk > max_risk {
                return RiskVerdict::reject(format!(
                    "Per-trade risk {risk} cents exceeds max {max_risk} cents ({}% of portfolio)",
                    limits.max_per_trade_risk_pct
                ));
            }

            info!(
                side = ?order.side,
                symbol = %order.symbol,
                quantity = order.quantity,
                price = order.price,
                stop_loss = order.stop_loss,
                "order approved"
            );
            RiskVerdict::approve("All risk checks passed")
        })
    }

    /// Feed a closed trade's P&L into the daily total and the loss streak.
    pub fn record_trade_result(&self, pnl: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        let limits = &self.limits;
        self.transact(|state| {
            state.daily_pnl += pnl;
            if pnl < 0 {
                state.consecutive_losses += 1;
                warn!(pnl, consecutive_losses = state.consecutive_losses, "loss recorded");
                if state.consecutive_losses >= limits.circuit_breaker_losses {
                    let until = now + Duration::minutes(limits.circuit_breaker_pause_minutes);
                    state.paused_until = Some(until);
                    warn!(%until, "circuit breaker triggered");
                }
            } else {
                state.consecutive_losses = 0;
            }
        })
    }

    /// Emergency halt.
    pub fn kill_switch(&self) -> Result<(), StoreError> {
        self.transact(|state| {
            state.halted = true;
            state.halt_reason = "Kill switch activated manually".to_string();
            error!("kill switch activated, all trading halted");
        })
    }

    /// Clear a halt. The loss streak is cleared too; daily P&L is not.
    pub fn reset_halt(&self) -> Result<(), StoreError> {
        self.transact(|state| {
            state.halted = false;
            state.halt_reason.clear();
            state.consecutive_losses = 0;
            info!("trading halt reset");
        })
    }

    /// Start a new trading day.
    pub fn reset_daily_pnl(&self) -> Result<(), StoreError> {
        self.transact(|state| state.daily_pnl = 0)
    }

    pub fn set_portfolio_value(&self, value: i64) -> Result<(), StoreError> {
        self.transact(|state| state.portfolio_value = value)
    }

    /// Current status, applying the pause auto-revert if it has elapsed.
    pub fn status(&self, now: DateTime<Utc>) -> Result<RiskStatus, StoreError> {
        self.transact(|state| {
            pause_remaining(state, now);
            state.status(now)
        })
    }

    pub fn is_halted(&self) -> Result<bool, StoreError> {
        Ok(self.store.get_state()?.halted)
    }

    /// Snapshot of the stored record.
    pub fn state(&self) -> Result<RiskState, StoreError> {
        self.store.get_state()
    }
}

/// Time left on an active pause. Clears an elapsed pause and the loss streak.
fn pause_remaining(state: &mut RiskState, now: DateTime<Utc>) -> Option<Duration> {
    let until = state.paused_until?;
    if now >= until {
        state.paused_until = None;
        state.consecutive_losses = 0;
        info!("circuit breaker pause expired, resuming trading");
        return None;
    }
    Some(until - now)
}

/// `quantity * |price - stop| / price`, or the whole quantity for a degenerate price.
fn per_trade_risk(order: &Order) -> i64 {
    if order.price <= 0 {
        return order.quantity;
    }
    let distance = (order.price - order.stop_loss).abs();
    (order.quantity as i128 * distance as i128 / order.price as i128) as i64
}

fn pct_of(value: i64, pct: f64) -> i64 {
    (value as f64 * pct / 100.0) as i64
}
