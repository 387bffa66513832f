//! TradeGate CLI — backtest, batch, evaluate, compare and risk commands.
//!
//! Commands:
//! - `backtest` — run one backtest from a TOML config and/or flags, save artifacts
//! - `batch` — run every (symbol, strategy) pair in parallel, print a summary
//! - `evaluate` — classify the latest window of a CSV series and emit the signal decision
//! - `compare` — side-by-side report of two saved runs
//! - `risk` — inspect or operate the durable Risk Gate state

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradegate_core::domain::{Market, Timeframe};
use tradegate_core::evaluator::SignalEvaluator;
use tradegate_core::risk::{JsonFileRiskStore, RiskGate, RiskStatus};
use tradegate_core::strategy::SymbolContext;
use tradegate_runner::batch::{BatchJob, BatchRunner};
use tradegate_runner::config::{BacktestConfig, StrategySelection};
use tradegate_runner::data_loader::{load_candles, LoadOptions};
use tradegate_runner::export::{
    export_json, format_cents, generate_comparison, generate_report, load_artifacts,
    save_artifacts,
};
use tradegate_runner::runner::run_single_backtest;

#[derive(Parser)]
#[command(
    name = "tradegate",
    about = "TradeGate CLI — regime-switching strategies behind a risk gate"
)]
struct Cli {
    /// Log filter (e.g. `debug`, `tradegate_runner=debug`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest and save its artifacts.
    Backtest {
        #[command(flatten)]
        target: TargetArgs,

        /// Output directory for manifest.json, trades.csv and equity.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the result JSON instead of the text report.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Do not write artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run many (symbol, strategy) backtests against one base config.
    Batch {
        /// Path to a base TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to run (comma separated).
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Market shared by every symbol.
        #[arg(long, default_value = "crypto")]
        market: Market,

        /// Strategies to run, comma separated.
        /// One of: auto, momentum, meanrev, turtle_crypto, turtle_stocks.
        #[arg(long, value_delimiter = ',', default_value = "auto")]
        strategies: Vec<StrategySelection>,

        /// Data directory override.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Run jobs one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Save artifacts for each successful job here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Evaluate the most recent window of a CSV series, as a live scheduler would.
    Evaluate {
        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "crypto")]
        market: Market,

        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Skip regime selection and use this strategy.
        #[arg(long)]
        strategy: Option<StrategySelection>,

        /// Account equity in cents used for sizing.
        #[arg(long, default_value_t = 1_000_000)]
        equity: i64,

        /// Only use the most recent N bars.
        #[arg(long, default_value_t = 200)]
        bars: usize,
    },
    /// Compare two saved runs (artifact directories).
    Compare { a: PathBuf, b: PathBuf },
    /// Risk Gate state operations.
    Risk {
        /// Path to the durable risk state file.
        #[arg(long, default_value = "risk_state.json")]
        state: PathBuf,

        #[command(subcommand)]
        action: RiskAction,
    },
}

/// What to backtest. Flags override the config file.
#[derive(Args)]
struct TargetArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    market: Option<Market>,

    #[arg(long)]
    timeframe: Option<Timeframe>,

    /// auto, momentum, meanrev, turtle_crypto or turtle_stocks.
    #[arg(long)]
    strategy: Option<StrategySelection>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Enable the Risk Gate in the backtest loop.
    #[arg(long, default_value_t = false)]
    risk: bool,
}

#[derive(Subcommand)]
enum RiskAction {
    /// Show the current state.
    Status,
    /// Emergency halt.
    Kill,
    /// Clear a halt and the loss streak.
    ResetHalt,
    /// Zero the daily P&L.
    ResetDaily,
    /// Set the portfolio value (cents) used for percentage limits.
    SetPortfolio { cents: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Backtest {
            target,
            output_dir,
            json,
            no_save,
        } => run_backtest_cmd(&target, &output_dir, json, no_save),
        Commands::Batch {
            config,
            symbols,
            market,
            strategies,
            data_dir,
            sequential,
            output_dir,
        } => run_batch_cmd(
            config.as_deref(),
            &symbols,
            market,
            &strategies,
            data_dir,
            sequential,
            output_dir.as_deref(),
        ),
        Commands::Evaluate {
            symbol,
            market,
            timeframe,
            data_dir,
            strategy,
            equity,
            bars,
        } => run_evaluate_cmd(
            LoadOptions {
                data_dir,
                symbol,
                market,
                timeframe,
                start: None,
                end: None,
            },
            strategy,
            equity,
            bars,
        ),
        Commands::Compare { a, b } => {
            let a = load_artifacts(&a)?;
            let b = load_artifacts(&b)?;
            print!("{}", generate_comparison(&a, &b));
            Ok(())
        }
        Commands::Risk { state, action } => run_risk_cmd(&state, action),
    }
}

/// Logs go to stderr so `--json` output stays clean on stdout.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(target: &TargetArgs) -> Result<BacktestConfig> {
    let mut config = match &target.config {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    let bt = &mut config.backtest;
    if let Some(symbol) = &target.symbol {
        bt.symbol = symbol.clone();
    }
    if let Some(market) = target.market {
        bt.market = market;
    }
    if let Some(timeframe) = target.timeframe {
        bt.timeframe = timeframe;
    }
    if let Some(strategy) = target.strategy {
        bt.strategy = strategy;
    }
    if let Some(dir) = &target.data_dir {
        bt.data_dir = dir.clone();
    }
    if target.start.is_some() {
        bt.start = target.start;
    }
    if target.end.is_some() {
        bt.end = target.end;
    }
    if target.risk {
        config.risk.enabled = true;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_backtest_cmd(
    target: &TargetArgs,
    output_dir: &Path,
    json: bool,
    no_save: bool,
) -> Result<()> {
    let config = build_config(target)?;
    let result = run_single_backtest(&config, None).with_context(|| {
        format!(
            "backtest failed for {} ({})",
            config.backtest.symbol,
            config.backtest.strategy.name()
        )
    })?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print!("{}", generate_report(&result));
    }

    if !no_save {
        let run_dir = save_artifacts(&result, output_dir)?;
        info!(dir = %run_dir.display(), "artifacts saved");
    }
    Ok(())
}

fn run_batch_cmd(
    config_path: Option<&Path>,
    symbols: &[String],
    market: Market,
    strategies: &[StrategySelection],
    data_dir: Option<PathBuf>,
    sequential: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    if symbols.is_empty() {
        bail!("--symbols must name at least one symbol");
    }
    let mut base = match config_path {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    if let Some(dir) = data_dir {
        base.backtest.data_dir = dir;
    }

    let pairs: Vec<(String, Market)> = symbols
        .iter()
        .map(|s| (s.trim().to_uppercase(), market))
        .collect();
    let jobs = BatchJob::grid(&pairs, strategies);
    let report = BatchRunner::new(base)
        .with_parallelism(!sequential)
        .run(&jobs, None);

    print!("{}", report.summary());
    if let Some(best) = report.best_by_return() {
        println!(
            "best: {}/{} {:.2}%",
            best.symbol, best.strategy_name, best.metrics.total_return_pct
        );
    }

    if let Some(dir) = output_dir {
        for result in report.results() {
            save_artifacts(result, dir)?;
        }
        info!(dir = %dir.display(), saved = report.succeeded(), "batch artifacts saved");
    }

    if report.succeeded() == 0 {
        bail!("all {} batch jobs failed", report.outcomes.len());
    }
    Ok(())
}

fn run_evaluate_cmd(
    opts: LoadOptions,
    strategy: Option<StrategySelection>,
    equity: i64,
    bars: usize,
) -> Result<()> {
    let loaded = load_candles(&opts)
        .with_context(|| format!("failed to load candles from {}", opts.path().display()))?;
    let window = &loaded.candles[loaded.candles.len().saturating_sub(bars)..];

    let config = BacktestConfig::default();
    let mut evaluator =
        SignalEvaluator::new(config.strategy, config.sizing).with_thresholds(config.regime);
    if let Some(StrategySelection::Fixed(kind)) = strategy {
        evaluator = evaluator.with_fixed_strategy(kind);
    }

    let evaluation = evaluator.evaluate_symbol(
        window,
        &opts.symbol,
        opts.market,
        &mut SymbolContext::default(),
        equity,
    );
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}

fn run_risk_cmd(state_path: &Path, action: RiskAction) -> Result<()> {
    let gate = RiskGate::new(JsonFileRiskStore::new(state_path), Default::default());
    let describe = || -> Result<()> {
        let state = gate.state()?;
        let status = match gate.status(Utc::now())? {
            RiskStatus::Normal => "normal".to_string(),
            RiskStatus::CircuitPaused { until } => format!("paused until {until}"),
            RiskStatus::Halted { reason } => format!("halted: {reason}"),
        };
        println!("status:             {status}");
        println!("consecutive losses: {}", state.consecutive_losses);
        println!("daily P&L:          {}", format_cents(state.daily_pnl));
        println!("portfolio value:    {}", format_cents(state.portfolio_value));
        Ok(())
    };

    match action {
        RiskAction::Status => {}
        RiskAction::Kill => gate.kill_switch()?,
        RiskAction::ResetHalt => gate.reset_halt()?,
        RiskAction::ResetDaily => gate.reset_daily_pnl()?,
        RiskAction::SetPortfolio { cents } => {
            if cents <= 0 {
                bail!("portfolio value must be positive, got {cents}");
            }
            gate.set_portfolio_value(cents)?;
        }
    }
    describe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tradegate_core::strategy::StrategyKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn backtest_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "tradegate",
            "backtest",
            "--symbol",
            "ETH",
            "--strategy",
            "turtle_crypto",
            "--timeframe",
            "4h",
            "--start",
            "2025-01-01",
            "--risk",
        ])
        .unwrap();
        let Commands::Backtest { target, .. } = cli.command else {
            panic!("expected backtest");
        };
        let config = build_config(&target).unwrap();
        assert_eq!(config.backtest.symbol, "ETH");
        assert_eq!(
            config.backtest.strategy,
            StrategySelection::Fixed(StrategyKind::TurtleCrypto)
        );
        assert_eq!(config.backtest.timeframe, Timeframe::Hour4);
        assert_eq!(config.backtest.start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(config.risk.enabled);
    }

    #[test]
    fn batch_lists_split_on_commas() {
        let cli = Cli::try_parse_from([
            "tradegate",
            "batch",
            "--symbols",
            "BTC,ETH",
            "--strategies",
            "auto,meanrev",
        ])
        .unwrap();
        let Commands::Batch {
            symbols, strategies, ..
        } = cli.command
        else {
            panic!("expected batch");
        };
        assert_eq!(symbols, ["BTC", "ETH"]);
        assert_eq!(
            strategies,
            [
                StrategySelection::Auto,
                StrategySelection::Fixed(StrategyKind::MeanReversion)
            ]
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["tradegate", "backtest", "--strategy", "yolo"]).is_err());
    }

    #[test]
    fn risk_commands_persist_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");
        run_risk_cmd(&path, RiskAction::Kill).unwrap();
        let gate = RiskGate::new(JsonFileRiskStore::new(&path), Default::default());
        assert!(gate.is_halted().unwrap());

        run_risk_cmd(&path, RiskAction::ResetHalt).unwrap();
        assert!(!gate.is_halted().unwrap());

        assert!(run_risk_cmd(&path, RiskAction::SetPortfolio { cents: 0 }).is_err());
        run_risk_cmd(&path, RiskAction::SetPortfolio { cents: 250_000 }).unwrap();
        assert_eq!(gate.state().unwrap().portfolio_value, 250_000);
    }
}
