//! Performance metrics — pure functions over the equity curve and trade list.
//!
//! Money stays in integer cents; ratios and statistics are `f64` and are only
//! rounded at the export boundary.

use serde::{Deserialize, Serialize};
use tradegate_core::domain::ClosedTrade;
use tradegate_core::simulator::EquityPoint;

/// Profit factor reported when a run has winners but no losers.
pub const PROFIT_FACTOR_NO_LOSSES: f64 = 9999.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    /// Largest peak-to-trough drop, in cents.
    pub max_drawdown: i64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub avg_win: i64,
    pub avg_loss: i64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_holding_bars: f64,
}

impl PerformanceMetrics {
    /// Compute every metric for a finished run.
    ///
    /// `bars_processed` drives annualization; `bars_per_year` comes from the
    /// run's timeframe.
    pub fn compute(
        starting_cash: i64,
        ending_equity: i64,
        equity_curve: &[EquityPoint],
        trades: &[ClosedTrade],
        bars_processed: usize,
        bars_per_year: f64,
    ) -> Self {
        let total = total_return_pct(starting_cash, ending_equity);
        let equity: Vec<i64> = equity_curve.iter().map(|p| p.equity).collect();
        let (max_dd_pct, max_dd) = max_drawdown(&equity);
        let winners = trades.iter().filter(|t| t.is_winner()).count();

        Self {
            total_return_pct: total,
            annualized_return_pct: annualized_return_pct(total, bars_processed, bars_per_year),
            sharpe_ratio: sharpe_ratio(&equity, bars_per_year),
            max_drawdown_pct: max_dd_pct,
            max_drawdown: max_dd,
            total_trades: trades.len(),
            winning_trades: winners,
            losing_trades: trades.len() - winners,
            win_rate_pct: win_rate_pct(trades),
            profit_factor: profit_factor(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_holding_bars: avg_holding_bars(trades),
        }
    }
}

// ─── Returns ────────────────────────────────────────────────────────

/// `(ending - starting) / starting * 100`. Zero for a non-positive start.
pub fn total_return_pct(starting: i64, ending: i64) -> f64 {
    if starting <= 0 {
        return 0.0;
    }
    (ending - starting) as f64 / starting as f64 * 100.0
}

/// Compound annualization: `((1 + total)^(1 / years) - 1) * 100`.
///
/// A total loss of 100% or worse reports -100.
pub fn annualized_return_pct(total_return_pct: f64, bars: usize, bars_per_year: f64) -> f64 {
    if bars == 0 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let years = bars as f64 / bars_per_year;
    let factor = 1.0 + total_return_pct / 100.0;
    if factor <= 0.0 {
        return -100.0;
    }
    (factor.powf(1.0 / years) - 1.0) * 100.0
}

/// Per-bar simple returns. Bars following a non-positive equity are skipped.
pub fn bar_returns(equity: &[i64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0)
        .map(|w| (w[1] - w[0]) as f64 / w[0] as f64)
        .collect()
}

/// Annualized Sharpe with a zero risk-free rate:
/// `mean / sample_std * sqrt(bars_per_year)`.
///
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(equity: &[i64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std == 0.0 {
        return 0.0;
    }
    mean_f64(&returns) / std * bars_per_year.sqrt()
}

/// Largest peak-to-trough drawdown as `(percent, cents)`.
///
/// The cents figure belongs to the drawdown with the largest percentage.
pub fn max_drawdown(equity: &[i64]) -> (f64, i64) {
    let Some(&first) = equity.first() else {
        return (0.0, 0);
    };
    let mut peak = first;
    let mut max_pct = 0.0_f64;
    let mut max_cents = 0_i64;

    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0 {
            let dd = peak - value;
            let pct = dd as f64 / peak as f64 * 100.0;
            if pct > max_pct {
                max_pct = pct;
                max_cents = dd;
            }
        }
    }
    (max_pct, max_cents)
}

// ─── Trade statistics ───────────────────────────────────────────────

/// Share of trades with positive P&L, in percent.
pub fn win_rate_pct(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profit over gross loss.
///
/// [`PROFIT_FACTOR_NO_LOSSES`] when nothing lost money but something won;
/// 0.0 when nothing won.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let (profit, loss) = gross(trades);
    if loss > 0 {
        profit as f64 / loss as f64
    } else if profit > 0 {
        PROFIT_FACTOR_NO_LOSSES
    } else {
        0.0
    }
}

/// Mean P&L of winning trades, truncated to whole cents.
pub fn avg_win(trades: &[ClosedTrade]) -> i64 {
    let winners = trades.iter().filter(|t| t.is_winner()).count() as i64;
    if winners == 0 {
        return 0;
    }
    gross(trades).0 / winners
}

/// Mean P&L of losing (including flat) trades; negative or zero.
pub fn avg_loss(trades: &[ClosedTrade]) -> i64 {
    let losers = trades.iter().filter(|t| !t.is_winner()).count() as i64;
    if losers == 0 {
        return 0;
    }
    -(gross(trades).1 / losers)
}

/// Longest run of winners (`winners = true`) or losers.
pub fn max_consecutive(trades: &[ClosedTrade], winners: bool) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

pub fn avg_holding_bars(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.holding_bars).sum::<usize>() as f64 / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// `(gross profit, |gross loss|)` in cents.
fn gross(trades: &[ClosedTrade]) -> (i64, i64) {
    trades.iter().fold((0, 0), |(profit, loss), t| {
        if t.is_winner() {
            (profit + t.pnl, loss)
        } else {
            (profit, loss - t.pnl)
        }
    })
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N - 1 denominator).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
