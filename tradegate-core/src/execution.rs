//! Execution targets: where approved orders go.
//!
//! The core never talks to a broker. [`ExecutionTarget`] is the seam; the
//! [`PaperExecutor`] fills instantly at the requested price and keeps its
//! positions in memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{pnl_of_notional, Market, Order, OrderSide};
use crate::risk::{RiskGate, RiskStateStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("position book lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Filled,
    Rejected,
}

/// Result of submitting one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: i64,
    pub reason: String,
    /// Realized P&L, present when a sell closed a position.
    pub pnl: Option<i64>,
    pub broker_order_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionReport {
    fn rejected(order: &Order, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ExecutionStatus::Rejected,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            reason: reason.into(),
            pnl: None,
            broker_order_id: None,
            timestamp: now,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.status == ExecutionStatus::Filled
    }
}

/// Something that consumes approved orders and reports fills or rejections.
pub trait ExecutionTarget: Send + Sync {
    fn submit(&self, order: &Order, now: DateTime<Utc>) -> Result<ExecutionReport, ExecutionError>;
}

/// An open paper position. `quantity` is notional in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPosition {
    pub symbol: String,
    pub market: Market,
    pub quantity: i64,
    pub entry_price: i64,
    pub stop_loss: i64,
    pub strategy: String,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Paper trading: every order passes the Risk Gate, fills at the requested price.
///
/// Orders for the same symbol are serialised by a per-symbol lock so two
/// callers racing on "current position for X" cannot lose an update.
pub struct PaperExecutor<S> {
    gate: Arc<RiskGate<S>>,
    positions: Mutex<HashMap<String, PaperPosition>>,
    symbol_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    journal: Mutex<Vec<ExecutionReport>>,
}

impl<S: RiskStateStore> PaperExecutor<S> {
    pub fn new(gate: Arc<RiskGate<S>>) -> Self {
        Self {
            gate,
            positions: Mutex::new(HashMap::new()),
            symbol_locks: Mutex::new(HashMap::new()),
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn gate(&self) -> &RiskGate<S> {
        &self.gate
    }

    pub fn position(&self, symbol: &str) -> Result<Option<PaperPosition>, ExecutionError> {
        let book = self.positions.lock().map_err(|_| ExecutionError::Poisoned)?;
        Ok(book.get(symbol).cloned())
    }

    /// Open positions sorted by symbol.
    pub fn positions(&self) -> Result<Vec<PaperPosition>, ExecutionError> {
        let book = self.positions.lock().map_err(|_| ExecutionError::Poisoned)?;
        let mut out: Vec<_> = book.values().cloned().collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(out)
    }

    /// Every report, filled or rejected, in submission order.
    pub fn journal(&self) -> Result<Vec<ExecutionReport>, ExecutionError> {
        let journal = self.journal.lock().map_err(|_| ExecutionError::Poisoned)?;
        Ok(journal.clone())
    }

    fn symbol_lock(&self, symbol: &str) -> Result<Arc<Mutex<()>>, ExecutionError> {
        let mut locks = self.symbol_locks.lock().map_err(|_| ExecutionError::Poisoned)?;
        Ok(locks.entry(symbol.to_string()).or_default().clone())
    }

    fn record(&self, report: ExecutionReport) -> Result<ExecutionReport, ExecutionError> {
        let mut journal = self.journal.lock().map_err(|_| ExecutionError::Poisoned)?;
        journal.push(report.clone());
        Ok(report)
    }

    fn open_or_add(&self, order: &Order, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        let mut book = self.positions.lock().map_err(|_| ExecutionError::Poisoned)?;
        match book.get_mut(&order.symbol) {
            Some(pos) => {
                let total = pos.quantity + order.quantity;
                if total > 0 {
                    pos.entry_price = ((pos.entry_price as i128 * pos.quantity as i128
                        + order.price as i128 * order.quantity as i128)
                        / total as i128) as i64;
                } else {
                    pos.entry_price = order.price;
                }
                pos.quantity = total;
                pos.stop_loss = order.stop_loss;
                pos.updated_at = now;
            }
            None => {
                book.insert(
                    order.symbol.clone(),
                    PaperPosition {
                        symbol: order.symbol.clone(),
                        market: order.market,
                        quantity: order.quantity,
                        entry_price: order.price,
                        stop_loss: order.stop_loss,
                        strategy: order.strategy.clone(),
                        opened_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    fn close(&self, order: &Order) -> Result<Option<i64>, ExecutionError> {
        let mut book = self.positions.lock().map_err(|_| ExecutionError::Poisoned)?;
        Ok(book
            .remove(&order.symbol)
            .map(|pos| pnl_of_notional(pos.quantity, pos.entry_price, order.price)))
    }
}

impl<S: RiskStateStore> ExecutionTarget for PaperExecutor<S> {
    fn submit(&self, order: &Order, now: DateTime<Utc>) -> Result<ExecutionReport, ExecutionError> {
        let lock = self.symbol_lock(&order.symbol)?;
        let _guard = lock.lock().map_err(|_| ExecutionError::Poisoned)?;

        let verdict = self.gate.evaluate(order, now)?;
        if !verdict.approved {
            warn!(symbol = %order.symbol, reason = %verdict.reason, "order rejected");
            return self.record(ExecutionReport::rejected(order, verdict.reason, now));
        }

        if order.side == OrderSide::Sell && self.position(&order.symbol)?.is_none() {
            warn!(symbol = %order.symbol, "sell rejected: no open position");
            return self.record(ExecutionReport::rejected(order, "No open position to sell", now));
        }

        let pnl = match order.side {
            OrderSide::Buy => {
                self.open_or_add(order, now)?;
                None
            }
            OrderSide::Sell => {
                let pnl = self.close(order)?;
                if let Some(pnl) = pnl {
                    self.gate.record_trade_result(pnl, now)?;
                    info!(symbol = %order.symbol, pnl, "position closed");
                }
                pnl
            }
        };

        info!(
            side = ?order.side,
            symbol = %order.symbol,
            quantity = order.quantity,
            price = order.price,
            "paper trade executed"
        );
        self.record(ExecutionReport {
            status: ExecutionStatus::Filled,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            reason: order.reason.clone(),
            pnl,
            broker_order_id: Some(format!("paper-{}", now.format("%Y%m%d%H%M%S"))),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderType;
    use crate::risk::{MemoryRiskStore, RiskLimits};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    fn order(side: OrderSide, quantity: i64, price: i64, stop: i64) -> Order {
        Order {
            symbol: "ETH".into(),
            market: Market::Crypto,
            side,
            order_type: OrderType::Market,
            quantity,
            price,
            stop_loss: stop,
            strategy: "momentum".into(),
            reason: "test".into(),
        }
    }

    fn executor() -> PaperExecutor<MemoryRiskStore> {
        PaperExecutor::new(Arc::new(RiskGate::new(MemoryRiskStore::new(), RiskLimits::default())))
    }

    #[test]
    fn buy_then_sell_realizes_pnl() {
        let exec = executor();
        let buy = exec.submit(&order(OrderSide::Buy, 10_000, 10_000, 9_500), now()).unwrap();
        assert!(buy.is_filled());
        assert_eq!(buy.broker_order_id.as_deref(), Some("paper-20250602100000"));

        let sell = exec.submit(&order(OrderSide::Sell, 10_000, 11_000, 11_000), now()).unwrap();
        assert_eq!(sell.pnl, Some(1_000));
        assert!(exec.position("ETH").unwrap().is_none());
        assert_eq!(exec.gate().state().unwrap().daily_pnl, 1_000);
    }

    #[test]
    fn sell_without_position_is_rejected() {
        let exec = executor();
        let report = exec.submit(&order(OrderSide::Sell, 100, 10_000, 10_000), now()).unwrap();
        assert_eq!(report.status, ExecutionStatus::Rejected);
        assert_eq!(report.reason, "No open position to sell");
        assert_eq!(exec.journal().unwrap().len(), 1);
    }

    #[test]
    fn gate_rejection_is_reported() {
        let exec = executor();
        let report = exec.submit(&order(OrderSide::Buy, 20_000, 10_000, 9_500), now()).unwrap();
        assert_eq!(report.status, ExecutionStatus::Rejected);
        assert!(report.reason.contains("exceeds max"));
        assert!(exec.positions().unwrap().is_empty());
    }

    #[test]
    fn second_buy_averages_in() {
        let exec = executor();
        exec.submit(&order(OrderSide::Buy, 5_000, 10_000, 9_500), now()).unwrap();
        exec.submit(&order(OrderSide::Buy, 5_000, 12_000, 11_000), now()).unwrap();
        let pos = exec.position("ETH").unwrap().unwrap();
        assert_eq!(pos.quantity, 10_000);
        assert_eq!(pos.entry_price, 11_000);
        assert_eq!(pos.stop_loss, 11_000);
    }

    #[test]
    fn losing_closes_feed_the_circuit_breaker() {
        let exec = executor();
        for _ in 0..3 {
            exec.submit(&order(OrderSide::Buy, 1_000, 10_000, 9_500), now()).unwrap();
            exec.submit(&order(OrderSide::Sell, 1_000, 9_000, 9_000), now()).unwrap();
        }
        let next = exec.submit(&order(OrderSide::Buy, 1_000, 10_000, 9_500), now()).unwrap();
        assert_eq!(next.status, ExecutionStatus::Rejected);
        assert!(next.reason.contains("circuit breaker"));
    }
}
