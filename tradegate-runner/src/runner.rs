//! Walk-forward backtest runner — wires strategies, sizing, the optional Risk
//! Gate and the position simulator over an expanding window.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads candles from the CSV source, then runs. Used by the CLI.
//! - `run_backtest()`: takes pre-loaded candles. No I/O.
//!
//! At bar `i` (from `warmup_bars` on) the strategy sees `candles[..=i]`, the
//! bars closed so far. Runs are single-threaded and deterministic.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use tradegate_core::data::{validate_series, DataError};
use tradegate_core::domain::{select_strongest, Candle, ClosedTrade, Signal, Timeframe};
use tradegate_core::regime::{classify_with, RegimeThresholds};
use tradegate_core::risk::{MemoryRiskStore, RiskGate, RiskLimits, StoreError};
use tradegate_core::simulator::PositionSimulator;
use tradegate_core::strategy::{Strategy, StrategyKind, StrategyParams, SymbolContext};

use crate::config::{BacktestConfig, ConfigError, StrategySelection};
use crate::data_loader::{hash_candles, load_candles, LoadError, LoadOptions};
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("invalid candle series: {0}")]
    Data(#[from] DataError),
    #[error("no candles for {symbol} {timeframe}")]
    NoCandles { symbol: String, timeframe: Timeframe },
    #[error("insufficient data for {symbol}: {bars} bars (need at least {required})")]
    InsufficientData {
        symbol: String,
        bars: usize,
        required: usize,
    },
    #[error("risk store error: {0}")]
    Risk(#[from] StoreError),
    #[error("backtest cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: usize },
}

/// Load candles for `config` from its data directory and run.
pub fn run_single_backtest(
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_candles(&LoadOptions::from(&config.backtest))?;
    run_backtest(config, &loaded.candles, cancel)
}

/// Run a backtest over pre-loaded, canonical candles.
///
/// `cancel` is polled between bars; a set flag aborts with
/// [`RunError::Cancelled`].
pub fn run_backtest(
    config: &BacktestConfig,
    candles: &[Candle],
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bt = &config.backtest;
    if candles.is_empty() {
        return Err(RunError::NoCandles {
            symbol: bt.symbol.clone(),
            timeframe: bt.timeframe,
        });
    }
    validate_series(candles)?;

    let warmup = bt.warmup_bars;
    let required = warmup + bt.min_trailing_bars.max(1);
    if candles.len() < required {
        return Err(RunError::InsufficientData {
            symbol: bt.symbol.clone(),
            bars: candles.len(),
            required,
        });
    }

    let run_id = config.run_id()?;
    let sim_config = config.simulator_config();
    let starting_cash = sim_config.starting_cash;
    let mut sim = PositionSimulator::new(sim_config);
    let mut selector = StrategySelector::new(bt.strategy, &config.strategy, &config.regime);
    let mut ctx = SymbolContext::default();
    let mut monitor = if config.risk.enabled {
        Some(RiskMonitor::new(config.risk.limits.clone(), starting_cash)?)
    } else {
        None
    };

    info!(
        strategy = bt.strategy.name(),
        symbol = %bt.symbol,
        market = %bt.market,
        timeframe = %bt.timeframe,
        bars = candles.len(),
        risk_gate = monitor.is_some(),
        "starting backtest"
    );

    for i in warmup..candles.len() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            warn!(symbol = %bt.symbol, bar = i, "backtest cancelled");
            return Err(RunError::Cancelled {
                bars_processed: i - warmup,
            });
        }

        let window = &candles[..=i];
        let bar = &candles[i];
        if let Some(monitor) = monitor.as_mut() {
            monitor.roll_day(bar.timestamp, sim.equity(bar.open))?;
        }
        if bt.strategy == StrategySelection::Auto && i % bt.regime_cadence == 0 {
            selector.reclassify(window, i);
        }

        let strategy = selector.current();
        let pyramiding = strategy.supports_pyramiding();
        let signals = strategy.generate_signals(window, &bt.symbol, bt.market, &mut ctx);
        let mut best = select_strongest(&signals)
            .filter(|s| actionable(s, sim.has_position(), pyramiding))
            .cloned()
            .map(|s| config.sizing.apply(s, window, sim.equity(bar.close)));

        if let (Some(monitor), Some(signal)) = (monitor.as_mut(), best.as_ref()) {
            if signal.is_buy() && !monitor.allows(signal, bar.timestamp)? {
                best = None;
            }
        }

        let closed_before = sim.closed_trades().len();
        sim.process_bar(best.as_ref(), bar, i, pyramiding);
        if let Some(monitor) = monitor.as_ref() {
            for trade in &sim.closed_trades()[closed_before..] {
                monitor.record(trade)?;
            }
        }
    }

    let last_index = candles.len() - 1;
    let last = &candles[last_index];
    sim.force_close(last.close, last.timestamp, last_index);

    let output = sim.finish();
    let bars_processed = candles.len() - warmup;
    let ending_equity = output.final_cash;
    let metrics = PerformanceMetrics::compute(
        starting_cash,
        ending_equity,
        &output.equity_curve,
        &output.closed_trades,
        bars_processed,
        bt.timeframe.bars_per_year(),
    );

    info!(
        strategy = bt.strategy.name(),
        symbol = %bt.symbol,
        return_pct = format!("{:.2}", metrics.total_return_pct),
        sharpe = format!("{:.2}", metrics.sharpe_ratio),
        trades = metrics.total_trades,
        win_rate_pct = format!("{:.1}", metrics.win_rate_pct),
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy_name: bt.strategy.name().to_string(),
        symbol: bt.symbol.clone(),
        market: bt.market,
        timeframe: bt.timeframe,
        start_date: candles[warmup].timestamp,
        end_date: last.timestamp,
        bars_processed,
        dataset_hash: hash_candles(candles),
        starting_cash,
        ending_cash: output.final_cash,
        ending_equity,
        total_fees: output.total_fees,
        metrics,
        regime_switches: selector.switches,
        risk_rejections: monitor.map_or(0, |m| m.rejections),
        trades: output.closed_trades,
        equity_curve: output.equity_curve,
    })
}

/// Sells need a held position; buys on a held position need pyramiding.
fn actionable(signal: &Signal, has_position: bool, pyramiding: bool) -> bool {
    if signal.is_buy() {
        !has_position || pyramiding
    } else {
        has_position
    }
}

/// Current strategy for the run. Auto mode starts on mean reversion and
/// follows the regime.
struct StrategySelector<'a> {
    params: &'a StrategyParams,
    thresholds: &'a RegimeThresholds,
    kind: StrategyKind,
    strategy: Box<dyn Strategy>,
    switches: usize,
}

impl<'a> StrategySelector<'a> {
    fn new(
        selection: StrategySelection,
        params: &'a StrategyParams,
        thresholds: &'a RegimeThresholds,
    ) -> Self {
        let kind = match selection {
            StrategySelection::Auto => StrategyKind::MeanReversion,
            StrategySelection::Fixed(kind) => kind,
        };
        Self {
            params,
            thresholds,
            kind,
            strategy: kind.build(params),
            switches: 0,
        }
    }

    fn current(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    fn reclassify(&mut self, window: &[Candle], index: usize) {
        let regime = classify_with(window, self.thresholds);
        let next = StrategyKind::for_regime(regime);
        debug!(index, %regime, "regime check");
        if next != self.kind {
            info!(index, %regime, from = %self.kind, to = %next, "regime switch");
            self.kind = next;
            self.strategy = next.build(self.params);
            self.switches += 1;
        }
    }
}

/// Risk Gate on an in-memory store, clocked by bar timestamps.
struct RiskMonitor {
    gate: RiskGate<MemoryRiskStore>,
    day: Option<NaiveDate>,
    rejections: usize,
}

impl RiskMonitor {
    fn new(limits: RiskLimits, portfolio_value: i64) -> Result<Self, StoreError> {
        let gate = RiskGate::new(MemoryRiskStore::new(), limits);
        gate.set_portfolio_value(portfolio_value)?;
        Ok(Self {
            gate,
            day: None,
            rejections: 0,
        })
    }

    /// Reset daily P&L and re-base the portfolio value on a new UTC date.
    fn roll_day(&mut self, now: DateTime<Utc>, equity: i64) -> Result<(), StoreError> {
        let today = now.date_naive();
        if self.day == Some(today) {
            return Ok(());
        }
        if self.day.is_some() {
            self.gate.reset_daily_pnl()?;
            self.gate.set_portfolio_value(equity)?;
        }
        self.day = Some(today);
        Ok(())
    }

    fn allows(&mut self, signal: &Signal, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let verdict = self.gate.evaluate(&signal.to_order(), now)?;
        if !verdict.approved {
            self.rejections += 1;
            debug!(symbol = %signal.symbol, reason = %verdict.reason, "buy blocked by risk gate");
        }
        Ok(verdict.approved)
    }

    fn record(&self, trade: &ClosedTrade) -> Result<(), StoreError> {
        self.gate.record_trade_result(trade.pnl, trade.exit_time)
    }
}
