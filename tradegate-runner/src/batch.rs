//! Batch runner — many (symbol, strategy) backtests over one base config.
//!
//! Jobs are independent and run on the rayon pool when `parallel` is set.
//! A failing job is recorded in the report and never aborts its siblings.

use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tradegate_core::domain::Market;

use crate::config::{BacktestConfig, StrategySelection};
use crate::result::BacktestResult;
use crate::runner::{run_single_backtest, RunError};

/// One backtest in a batch. Overrides the base config's `[backtest]` target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub symbol: String,
    pub market: Market,
    pub strategy: StrategySelection,
}

impl BatchJob {
    pub fn new(symbol: impl Into<String>, market: Market, strategy: StrategySelection) -> Self {
        Self {
            symbol: symbol.into(),
            market,
            strategy,
        }
    }

    /// Every symbol crossed with every strategy, symbol-major.
    pub fn grid(symbols: &[(String, Market)], strategies: &[StrategySelection]) -> Vec<BatchJob> {
        symbols
            .iter()
            .flat_map(|(symbol, market)| {
                strategies
                    .iter()
                    .map(move |&strategy| BatchJob::new(symbol.clone(), *market, strategy))
            })
            .collect()
    }

    /// The base config retargeted at this job.
    pub fn config(&self, base: &BacktestConfig) -> BacktestConfig {
        let mut config = base.clone();
        config.backtest.symbol = self.symbol.clone();
        config.backtest.market = self.market;
        config.backtest.strategy = self.strategy;
        config
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.symbol, self.strategy.name())
    }
}

/// Result of one job; failures keep the rendered error.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: BatchJob,
    pub result: Result<BacktestResult, String>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs a list of jobs against a base configuration.
pub struct BatchRunner {
    base: BacktestConfig,
    parallel: bool,
}

impl BatchRunner {
    pub fn new(base: BacktestConfig) -> Self {
        Self {
            base,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every job. Outcomes come back in job order.
    pub fn run(&self, jobs: &[BatchJob], cancel: Option<&AtomicBool>) -> BatchReport {
        self.run_with(jobs, |config| run_single_backtest(config, cancel))
    }

    /// Run every job through `run_one` instead of the CSV-backed runner.
    pub fn run_with<F>(&self, jobs: &[BatchJob], run_one: F) -> BatchReport
    where
        F: Fn(&BacktestConfig) -> Result<BacktestResult, RunError> + Send + Sync,
    {
        info!(jobs = jobs.len(), parallel = self.parallel, "starting batch");

        let execute = |job: &BatchJob| {
            let result = run_one(&job.config(&self.base)).map_err(|e| {
                warn!(job = %job.label(), error = %e, "batch job failed");
                e.to_string()
            });
            JobOutcome {
                job: job.clone(),
                result,
            }
        };

        let outcomes: Vec<JobOutcome> = if self.parallel {
            jobs.par_iter().map(execute).collect()
        } else {
            jobs.iter().map(execute).collect()
        };

        let report = BatchReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch complete"
        );
        report
    }
}

/// All outcomes of a batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn results(&self) -> impl Iterator<Item = &BacktestResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Successful run with the highest total return.
    pub fn best_by_return(&self) -> Option<&BacktestResult> {
        self.results().max_by(|a, b| {
            a.metrics
                .total_return_pct
                .total_cmp(&b.metrics.total_return_pct)
        })
    }

    /// Plain-text summary table, one line per job.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<24} {:>9} {:>8} {:>8} {:>7} {:>7}\n",
            "job", "return%", "sharpe", "maxdd%", "trades", "win%"
        ));
        for o in &self.outcomes {
            match &o.result {
                Ok(r) => {
                    let m = &r.metrics;
                    out.push_str(&format!(
                        "{:<24} {:>9.2} {:>8.2} {:>8.2} {:>7} {:>7.1}\n",
                        o.job.label(),
                        m.total_return_pct,
                        m.sharpe_ratio,
                        m.max_drawdown_pct,
                        m.total_trades,
                        m.win_rate_pct
                    ));
                }
                Err(e) => out.push_str(&format!("{:<24} FAILED: {e}\n", o.job.label())),
            }
        }
        out.push_str(&format!(
            "{} succeeded, {} failed\n",
            self.succeeded(),
            self.failed()
        ));
        out
    }
}
