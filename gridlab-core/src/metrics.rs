//! Run metrics — pure functions over a completed run.
//!
//! Every metric is computed once, after the last bar, from the equity history
//! and the fill log. Nothing here is annualized: Sharpe is a per-bar ratio and
//! annualization is left to the caller.

use serde::{Deserialize, Serialize};

use crate::domain::Fill;

/// Volatility floor below which Sharpe is reported as 0.
pub const SHARPE_EPSILON: f64 = 1e-12;

/// Derived statistics for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub turnover: f64,
    pub exposure: f64,
    pub trade_count: usize,
}

impl RunMetrics {
    pub fn compute(equity_history: &[f64], fills: &[Fill], position: f64, last_close: f64) -> Self {
        Self {
            max_drawdown: max_drawdown(equity_history),
            sharpe: sharpe_ratio(equity_history),
            win_rate: win_rate(fills),
            turnover: turnover(fills),
            exposure: exposure(position, last_close),
            trade_count: fills.len(),
        }
    }

    /// Name of the first non-finite field, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("maxDrawdown", self.max_drawdown),
            ("sharpe", self.sharpe),
            ("winRate", self.win_rate),
            ("turnover", self.turnover),
            ("exposure", self.exposure),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// Maximum drawdown as a positive fraction of the running peak (0.25 = 25%).
///
/// Points where the running peak is not positive are ignored.
pub fn max_drawdown(equity_history: &[f64]) -> f64 {
    let Some(&first) = equity_history.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_history {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (peak - eq) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Per-bar simple returns: `(e_i - e_{i-1}) / e_{i-1}`.
///
/// A zero previous equity yields a non-finite return; callers treat that as
/// an execution error rather than masking it.
pub fn bar_returns(equity_history: &[f64]) -> Vec<f64> {
    equity_history
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Per-bar Sharpe ratio: `mean(r) / stddev(r)` with population stddev.
///
/// Returns 0.0 with no returns or when stddev is within [`SHARPE_EPSILON`].
pub fn sharpe_ratio(equity_history: &[f64]) -> f64 {
    let returns = bar_returns(equity_history);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = population_std_dev(&returns);
    if std.is_finite() && std <= SHARPE_EPSILON {
        return 0.0;
    }
    mean / std
}

/// Fill-adjacent win rate.
///
/// `fills[i + 1]` is treated as the exit of `fills[i]`; a pair wins when the
/// exit price is above the entry price. The count is divided by the total
/// number of fills. This is not position-aware.
pub fn win_rate(fills: &[Fill]) -> f64 {
    if fills.is_empty() {
        return 0.0;
    }
    let wins = fills.windows(2).filter(|w| w[1].price > w[0].price).count();
    wins as f64 / fills.len() as f64
}

/// Total traded notional, `sum(|price * quantity|)`.
pub fn turnover(fills: &[Fill]) -> f64 {
    fills.iter().map(Fill::notional).sum()
}

/// Absolute market value of the final position at the last close.
pub fn exposure(position: f64, last_close: f64) -> f64 {
    (position * last_close).abs()
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
