//! Walk-forward validation — train/validate/test splits and overfitting check.
//!
//! Each fold runs the same strategy parameters independently on its train,
//! optional validate and test segments. Segment metrics are averaged across
//! folds and the overfitting ratio is `mean test Sharpe / mean train Sharpe`
//! (a zero train Sharpe counts as 1). A ratio below the threshold flags the
//! parameters as overfit.
//!
//! Ranges are half-open bar index ranges `[start, end)`.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridlab_core::{run_backtest, Bar, EngineError, EngineOptions, Params, StrategyError, StrategyFactory};

pub const OVERFITTING_THRESHOLD: f64 = 0.6;
pub const DEFAULT_STEP: f64 = 0.2;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalkForwardConfig {
    pub train_ratio: f64,
    /// 0 disables the validate segment.
    pub validate_ratio: f64,
    pub test_ratio: f64,
    /// Slide a window of `train + validate + test` across the feed instead of
    /// a single split.
    pub rolling_window: bool,
    /// Window step as a fraction of the feed length (rolling only).
    pub step: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.6,
            validate_ratio: 0.2,
            test_ratio: 0.2,
            rolling_window: false,
            step: DEFAULT_STEP,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        let ratios = [
            ("trainRatio", self.train_ratio),
            ("validateRatio", self.validate_ratio),
            ("testRatio", self.test_ratio),
        ];
        for (field, value) in ratios {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(WalkForwardError::InvalidConfig(format!("{field} must be in [0, 1], got {value}")));
            }
        }
        if self.train_ratio + self.validate_ratio + self.test_ratio > 1.0 + 1e-9 {
            return Err(WalkForwardError::InvalidConfig("ratios sum to more than 1".into()));
        }
        if self.rolling_window && !(self.step.is_finite() && self.step > 0.0) {
            return Err(WalkForwardError::InvalidConfig(format!("step must be > 0, got {}", self.step)));
        }
        Ok(())
    }
}

// ─── Fold creation ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fold {
    pub fold_id: usize,
    pub train: Range<usize>,
    pub validate: Option<Range<usize>>,
    pub test: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalkForwardError {
    #[error("invalid walk-forward config: {0}")]
    InvalidConfig(String),
    #[error("no folds fit in {bars} bars")]
    NoFolds { bars: usize },
    #[error("fold {fold}: strategy build failed: {source}")]
    Strategy {
        fold: usize,
        #[source]
        source: StrategyError,
    },
    #[error("fold {fold}: backtest failed: {source}")]
    Backtest {
        fold: usize,
        #[source]
        source: EngineError,
    },
}

fn floor_mul(n: usize, ratio: f64) -> usize {
    (n as f64 * ratio).floor() as usize
}

/// Split `bar_count` bars into folds.
///
/// Single split: train `[0, n*train)`, validate up to `n*(train+validate)`,
/// test to the end of the feed. Rolling: windows of `n*(train+validate+test)`
/// bars starting every `n*step` bars, each split by the same ratios.
pub fn build_folds(bar_count: usize, cfg: &WalkForwardConfig) -> Result<Vec<Fold>, WalkForwardError> {
    cfg.validate()?;
    let has_validate = cfg.validate_ratio > 0.0;

    let split = |fold_id: usize, start: usize, len: usize, end: usize| {
        let train_end = start + floor_mul(len, cfg.train_ratio);
        let validate_end = if has_validate {
            start + floor_mul(len, cfg.train_ratio + cfg.validate_ratio)
        } else {
            train_end
        };
        Fold {
            fold_id,
            train: start..train_end,
            validate: has_validate.then_some(train_end..validate_end),
            test: validate_end..end,
        }
    };

    if !cfg.rolling_window {
        return Ok(vec![split(0, 0, bar_count, bar_count)]);
    }

    let window = floor_mul(bar_count, cfg.train_ratio + cfg.validate_ratio + cfg.test_ratio);
    let step = floor_mul(bar_count, cfg.step);
    if window == 0 || step == 0 {
        return Err(WalkForwardError::NoFolds { bars: bar_count });
    }

    let mut folds = Vec::new();
    let mut start = 0;
    while start + window <= bar_count {
        folds.push(split(folds.len(), start, window, start + window));
        start += step;
    }
    Ok(folds)
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Metrics reported per segment and averaged across folds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetrics {
    pub sharpe: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub pnl: f64,
    pub trades: usize,
}

impl SegmentMetrics {
    /// Arithmetic mean; the trade count is rounded to the nearest integer.
    pub fn average(all: &[SegmentMetrics]) -> Self {
        if all.is_empty() {
            return Self::default();
        }
        let n = all.len() as f64;
        let sum = |f: fn(&SegmentMetrics) -> f64| all.iter().map(f).sum::<f64>() / n;
        Self {
            sharpe: sum(|m| m.sharpe),
            win_rate: sum(|m| m.win_rate),
            max_drawdown: sum(|m| m.max_drawdown),
            pnl: sum(|m| m.pnl),
            trades: sum(|m| m.trades as f64).round() as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldReport {
    pub fold_id: usize,
    pub train: SegmentMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<SegmentMetrics>,
    pub test: SegmentMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overfitting {
    pub detected: bool,
    pub ratio: f64,
    pub threshold: f64,
}

impl Overfitting {
    pub fn assess(train_sharpe: f64, test_sharpe: f64) -> Self {
        let denominator = if train_sharpe == 0.0 || train_sharpe.is_nan() {
            1.0
        } else {
            train_sharpe
        };
        let ratio = test_sharpe / denominator;
        Self {
            detected: ratio < OVERFITTING_THRESHOLD,
            ratio,
            threshold: OVERFITTING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub train: SegmentMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<SegmentMetrics>,
    pub test: SegmentMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkForwardResult {
    pub folds: usize,
    pub overfitting: Overfitting,
    pub summary: Summary,
    pub fold_details: Vec<FoldReport>,
}

fn run_segment(
    fold: usize,
    bars: &[Bar],
    factory: &dyn StrategyFactory,
    params: &Params,
    options: &EngineOptions,
) -> Result<SegmentMetrics, WalkForwardError> {
    let mut strategy = factory
        .build(params)
        .map_err(|source| WalkForwardError::Strategy { fold, source })?;
    let r = run_backtest(bars, strategy.as_mut(), options)
        .map_err(|source| WalkForwardError::Backtest { fold, source })?;
    Ok(SegmentMetrics {
        sharpe: r.sharpe,
        win_rate: r.win_rate,
        max_drawdown: r.max_drawdown,
        pnl: r.pnl,
        trades: r.trade_count,
    })
}

/// Evaluate one parameter set across every fold of `bars`.
pub fn run_walk_forward(
    bars: &[Bar],
    factory: &dyn StrategyFactory,
    params: &Params,
    options: &EngineOptions,
    cfg: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    let folds = build_folds(bars.len(), cfg)?;
    if folds.is_empty() {
        return Err(WalkForwardError::NoFolds { bars: bars.len() });
    }

    let mut details = Vec::with_capacity(folds.len());
    for fold in &folds {
        let train = run_segment(fold.fold_id, &bars[fold.train.clone()], factory, params, options)?;
        let validate = match &fold.validate {
            Some(range) => Some(run_segment(fold.fold_id, &bars[range.clone()], factory, params, options)?),
            None => None,
        };
        let test = run_segment(fold.fold_id, &bars[fold.test.clone()], factory, params, options)?;
        tracing::debug!(fold = fold.fold_id, train_sharpe = train.sharpe, test_sharpe = test.sharpe, "fold evaluated");
        details.push(FoldReport {
            fold_id: fold.fold_id,
            train,
            validate,
            test,
        });
    }

    let trains: Vec<_> = details.iter().map(|d| d.train).collect();
    let validates: Vec<_> = details.iter().filter_map(|d| d.validate).collect();
    let tests: Vec<_> = details.iter().map(|d| d.test).collect();
    let summary = Summary {
        train: SegmentMetrics::average(&trains),
        validate: (!validates.is_empty()).then(|| SegmentMetrics::average(&validates)),
        test: SegmentMetrics::average(&tests),
    };
    let overfitting = Overfitting::assess(summary.train.sharpe, summary.test.sharpe);
    tracing::info!(
        folds = details.len(),
        ratio = overfitting.ratio,
        detected = overfitting.detected,
        "walk-forward finished"
    );

    Ok(WalkForwardResult {
        folds: details.len(),
        overfitting,
        summary,
        fold_details: details,
    })
}
