//! Reporting and export — JSON, CSV and Markdown artifacts.
//!
//! - **JSON**: the rounded result record with schema versioning
//! - **CSV**: trade tape and equity curve for external analysis tools
//! - **Markdown**: single-run report and side-by-side comparison
//!
//! Persisted JSON carries `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradegate_core::domain::ClosedTrade;
use tradegate_core::simulator::EquityPoint;

use crate::result::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize the rounded result to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&result.rounded())
        .context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape. Prices and P&L are cents.
pub fn export_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "market",
        "strategy",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "quantity",
        "pnl",
        "return_pct",
        "exit_reason",
        "holding_bars",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.as_str(),
            t.market.as_str(),
            t.strategy.as_str(),
            &t.entry_time.to_rfc3339(),
            &t.exit_time.to_rfc3339(),
            &t.entry_price.to_string(),
            &t.exit_price.to_string(),
            &t.quantity.to_string(),
            &t.pnl.to_string(),
            &format!("{:.2}", t.return_pct()),
            t.exit_reason.as_str(),
            &t.holding_bars.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Bar-by-bar equity and cash, in cents.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "cash"])?;
    for p in equity_curve {
        wtr.write_record([p.timestamp.to_rfc3339(), p.equity.to_string(), p.cash.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory name for a run: `{symbol}_{strategy}_{run id prefix}`.
pub fn artifact_dir_name(result: &BacktestResult) -> String {
    let id: String = result.run_id.chars().take(12).collect();
    format!("{}_{}_{}", result.symbol, result.strategy_name, id)
}

/// Save the artifact set for a run under `output_dir`:
/// - `manifest.json` — the rounded `BacktestResult`
/// - `trades.csv` — trade tape
/// - `equity.csv` — equity curve
///
/// Returns the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("manifest.json"), &json)?;

    let trades_csv = export_trades_csv(&result.trades)?;
    std::fs::write(run_dir.join("trades.csv"), &trades_csv)?;

    let equity_csv = export_equity_csv(&result.equity_curve)?;
    std::fs::write(run_dir.join("equity.csv"), &equity_csv)?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Format cents as dollars, e.g. `-1234` → `-$12.34`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", result.strategy_name));
    md.push_str(&format!(
        "| Symbol | {} ({}, {}) |\n",
        result.symbol, result.market, result.timeframe
    ));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date.format("%Y-%m-%d %H:%M"),
        result.end_date.format("%Y-%m-%d %H:%M")
    ));
    md.push_str(&format!("| Bars | {} |\n", result.bars_processed));
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    if result.regime_switches > 0 {
        md.push_str(&format!("| Regime Switches | {} |\n", result.regime_switches));
    }
    if result.risk_rejections > 0 {
        md.push_str(&format!("| Risk Rejections | {} |\n", result.risk_rejections));
    }
    md.push('\n');

    md.push_str("## Capital\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Starting Cash | {} |\n", format_cents(result.starting_cash)));
    md.push_str(&format!("| Ending Equity | {} |\n", format_cents(result.ending_equity)));
    md.push_str(&format!("| Fees | {} |\n", format_cents(result.total_fees)));
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return_pct));
    md.push_str(&format!("| Annualized Return | {:.2}% |\n", m.annualized_return_pct));
    md.push_str(&format!("| Sharpe | {:.2} |\n", m.sharpe_ratio));
    md.push_str(&format!(
        "| Max Drawdown | {:.2}% ({}) |\n",
        m.max_drawdown_pct,
        format_cents(m.max_drawdown)
    ));
    md.push_str(&format!(
        "| Trades | {} ({} won, {} lost) |\n",
        m.total_trades, m.winning_trades, m.losing_trades
    ));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate_pct));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Avg Win | {} |\n", format_cents(m.avg_win)));
    md.push_str(&format!("| Avg Loss | {} |\n", format_cents(m.avg_loss)));
    md.push_str(&format!(
        "| Streaks | {} wins / {} losses |\n",
        m.max_consecutive_wins, m.max_consecutive_losses
    ));
    md.push_str(&format!("| Avg Holding | {:.1} bars |\n", m.avg_holding_bars));
    md.push('\n');

    if !result.trades.is_empty() {
        md.push_str("## Exits\n\n");
        for reason in ["signal", "stop_loss", "backtest_end"] {
            let n = result
                .trades
                .iter()
                .filter(|t| t.exit_reason.as_str() == reason)
                .count();
            if n > 0 {
                md.push_str(&format!("- {reason}: {n}\n"));
            }
        }
        md.push('\n');
    }

    md
}

/// Markdown comparison of two runs, B relative to A.
pub fn generate_comparison(a: &BacktestResult, b: &BacktestResult) -> String {
    fn signed(d: f64, decimals: usize, suffix: &str) -> String {
        let sign = if d >= 0.0 { "+" } else { "" };
        format!("{sign}{d:.decimals$}{suffix}")
    }

    let mut md = String::with_capacity(1024);
    let (ma, mb) = (&a.metrics, &b.metrics);

    md.push_str("# Strategy Comparison\n\n");
    md.push_str("| Metric | A | B | Delta |\n");
    md.push_str("| --- | ---: | ---: | ---: |\n");
    md.push_str(&format!(
        "| Run | {} {} | {} {} | |\n",
        a.strategy_name, a.symbol, b.strategy_name, b.symbol
    ));

    let rows = [
        ("Total Return", ma.total_return_pct, mb.total_return_pct, "%"),
        ("Annualized Return", ma.annualized_return_pct, mb.annualized_return_pct, "%"),
        ("Sharpe", ma.sharpe_ratio, mb.sharpe_ratio, ""),
        ("Max Drawdown", ma.max_drawdown_pct, mb.max_drawdown_pct, "%"),
        ("Win Rate", ma.win_rate_pct, mb.win_rate_pct, "%"),
        ("Profit Factor", ma.profit_factor, mb.profit_factor, ""),
    ];
    for (label, va, vb, suffix) in rows {
        md.push_str(&format!(
            "| {label} | {va:.2}{suffix} | {vb:.2}{suffix} | {} |\n",
            signed(vb - va, 2, suffix)
        ));
    }
    md.push_str(&format!(
        "| Trades | {} | {} | {:+} |\n",
        ma.total_trades,
        mb.total_trades,
        mb.total_trades as i64 - ma.total_trades as i64
    ));
    md.push('\n');
    md
}
