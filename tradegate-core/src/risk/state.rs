//! Durable risk state and configurable limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portfolio value assumed until `set_portfolio_value` is called (cents).
pub const DEFAULT_PORTFOLIO_VALUE: i64 = 1_000_000;

/// Process-wide risk record, persisted by a [`super::RiskStateStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskState {
    pub halted: bool,
    pub halt_reason: String,
    pub consecutive_losses: u32,
    pub daily_pnl: i64,
    pub paused_until: Option<DateTime<Utc>>,
    pub portfolio_value: i64,
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            halted: false,
            halt_reason: String::new(),
            consecutive_losses: 0,
            daily_pnl: 0,
            paused_until: None,
            portfolio_value: DEFAULT_PORTFOLIO_VALUE,
        }
    }
}

impl RiskState {
    /// Derived state machine position at `now`. Does not apply the auto-revert.
    pub fn status(&self, now: DateTime<Utc>) -> RiskStatus {
        if self.halted {
            return RiskStatus::Halted {
                reason: self.halt_reason.clone(),
            };
        }
        match self.paused_until {
            Some(until) if now < until => RiskStatus::CircuitPaused { until },
            _ => RiskStatus::Normal,
        }
    }
}

/// The three states of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RiskStatus {
    Normal,
    CircuitPaused { until: DateTime<Utc> },
    Halted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest notional a single order may carry (cents).
    pub max_position_size: i64,
    /// Per-trade risk cap as a percentage of portfolio value.
    pub max_per_trade_risk_pct: f64,
    /// Daily loss, as a percentage of portfolio value, that halts trading.
    pub max_daily_drawdown_pct: f64,
    pub circuit_breaker_losses: u32,
    pub circuit_breaker_pause_minutes: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 10_000,
            max_per_trade_risk_pct: 2.0,
            max_daily_drawdown_pct: 5.0,
            circuit_breaker_losses: 3,
            circuit_breaker_pause_minutes: 60,
        }
    }
}
