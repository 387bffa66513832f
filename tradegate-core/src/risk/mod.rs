//! Risk Gate — every proposed order passes through here before execution.
//!
//! The gate itself is stateless between calls: it reads [`RiskState`] from a
//! [`RiskStateStore`] at the start of every evaluation or result recording
//! and writes it back at the end, so independent callers sharing one store
//! observe a single halt/pause status.

mod gate;
mod state;
mod store;

pub use gate::RiskGate;
pub use state::{RiskLimits, RiskState, RiskStatus, DEFAULT_PORTFOLIO_VALUE};
pub use store::{JsonFileRiskStore, MemoryRiskStore, RiskStateStore, StoreError};
