//! Engine options and the terminal run result.

use crate::domain::Fill;
use crate::engine::cost_model::CostModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// How buy orders are checked against available cash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashMode {
    /// Reject any buy whose notional plus fee exceeds cash. Cash never goes negative.
    #[default]
    Strict,
    /// Allow negative (margin-financed) cash.
    Margin,
}

/// Configuration for a single backtest run. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    #[serde(alias = "initial_cash")]
    pub initial_cash: f64,
    #[serde(alias = "fee_bps")]
    pub fee_bps: f64,
    #[serde(alias = "slippage_bps")]
    pub slippage_bps: f64,
    #[serde(alias = "cash_mode")]
    pub cash_mode: CashMode,
    /// Upper bound on the position after a buy. `None` means unbounded.
    #[serde(alias = "max_position")]
    pub max_position: Option<f64>,
    /// Defer market orders to the next bar's open (T+1 fills).
    #[serde(alias = "use_next_bar_open")]
    pub use_next_bar_open: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            initial_cash: 10_000.0,
            fee_bps: 0.0,
            slippage_bps: 0.0,
            cash_mode: CashMode::Strict,
            max_position: None,
            use_next_bar_open: true,
        }
    }
}

/// Invalid engine options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("initial cash must be finite and positive, got {0}")]
    InitialCash(f64),
    #[error("{field} must be finite and non-negative, got {value}")]
    Bps { field: &'static str, value: f64 },
    #[error("max position must be positive, got {0}")]
    MaxPosition(f64),
}

impl EngineOptions {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            ..Self::default()
        }
    }

    pub fn with_costs(mut self, fee_bps: f64, slippage_bps: f64) -> Self {
        self.fee_bps = fee_bps;
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_cash_mode(mut self, cash_mode: CashMode) -> Self {
        self.cash_mode = cash_mode;
        self
    }

    pub fn with_max_position(mut self, max_position: f64) -> Self {
        self.max_position = Some(max_position);
        self
    }

    pub fn with_next_bar_open(mut self, use_next_bar_open: bool) -> Self {
        self.use_next_bar_open = use_next_bar_open;
        self
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_bps, self.fee_bps)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        // zero cash gives a zero equity path and undefined bar returns
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(OptionsError::InitialCash(self.initial_cash));
        }
        for (field, value) in [("feeBps", self.fee_bps), ("slippageBps", self.slippage_bps)] {
            if !value.is_finite() || value < 0.0 {
                return Err(OptionsError::Bps { field, value });
            }
        }
        if let Some(max) = self.max_position {
            // +inf is accepted as an explicit "unbounded"
            if max.is_nan() || max <= 0.0 {
                return Err(OptionsError::MaxPosition(max));
            }
        }
        Ok(())
    }
}

/// Terminal, immutable snapshot of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub final_equity: f64,
    pub cash: f64,
    pub position: f64,
    pub pnl: f64,
    pub fills: Vec<Fill>,
    pub trade_count: usize,
    pub turnover: f64,
    pub exposure: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub equity_history: Vec<f64>,
    pub same_bar_fill_count: usize,
    pub skipped_order_count: usize,
    /// Last value per key recorded through `ctx.metrics.mark`.
    pub marks: BTreeMap<String, f64>,
}
