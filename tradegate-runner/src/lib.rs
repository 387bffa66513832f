//! TradeGate Runner — backtest orchestration, metrics, configuration, export.
//!
//! This crate builds on `tradegate-core` to provide:
//! - TOML backtest configuration with content-hashed run ids
//! - CSV candle source with canonicalization and date filtering
//! - Walk-forward backtest runner with optional Risk Gate and auto regime switching
//! - Performance metrics over the equity curve and trade list
//! - JSON/CSV/Markdown export of results
//! - Parallel batch runner over (symbol, strategy) jobs

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod result;
pub mod runner;

pub use batch::{BatchJob, BatchReport, BatchRunner, JobOutcome};
pub use config::{BacktestConfig, ConfigError, RunId, StrategySelection};
pub use data_loader::{load_candles, LoadError, LoadOptions, LoadedCandles};
pub use metrics::PerformanceMetrics;
pub use result::{BacktestResult, SCHEMA_VERSION};
pub use runner::{run_backtest, run_single_backtest, RunError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn batch_types_are_send_sync() {
        assert_send::<BatchJob>();
        assert_sync::<BatchJob>();
        assert_send::<BatchRunner>();
        assert_sync::<BatchRunner>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
