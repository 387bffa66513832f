//! TradeGate Core — indicators, regime, strategies, risk gate, position simulator.
//!
//! This crate contains the decision core of the trading engine:
//! - Domain types (candles, signals, orders, positions, closed trades)
//! - Indicator library with NaN warm-up as the "undefined" sentinel
//! - Regime classifier (trending / ranging / volatile)
//! - Strategy variants behind one trait, with caller-owned per-symbol state
//! - Risk-budget position sizing
//! - Risk gate backed by a narrow state-store interface
//! - Single-position, long-only simulator with fees, stops and pyramiding
//! - Live evaluator and paper execution target

pub mod data;
pub mod domain;
pub mod evaluator;
pub mod execution;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod simulator;
pub mod sizing;
pub mod strategy;
