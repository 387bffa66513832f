//! Domain types for the trading decision engine.

pub mod candle;
pub mod order;
pub mod position;
pub mod signal;
pub mod trade;

pub use candle::{closes, Candle, Market, Timeframe};
pub use order::{Order, OrderSide, OrderType, RiskVerdict};
pub use position::{pnl_of_notional, Position};
pub use signal::{select_strongest, Action, Signal, DEFAULT_SIGNAL_QUANTITY};
pub use trade::{ClosedTrade, ExitReason};

/// Symbol type alias
pub type Symbol = String;
