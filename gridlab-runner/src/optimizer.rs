//! Grid-search optimizer.
//!
//! Phases per request:
//! 1. Validate: engine options, concurrency and grid size, before any simulation
//! 2. Execute: one fresh strategy and one `run_backtest` per combination, on a
//!    bounded pool sharing the bar slice read-only
//! 3. Rank: stable descending sort by the objective, best + top-K
//! 4. Screen (opt-in): walk-forward every leaderboard entry and drop the
//!    overfit ones, unless all of them are overfit
//! 5. Report: timing, dataset hash and the metrics sink

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridlab_core::data::dataset_hash;
use gridlab_core::engine::OptionsError;
use gridlab_core::{run_backtest, Bar, EngineError, Params, StrategyError, StrategyFactory};

use crate::config::{ConfigError, OptimizeRequest, OptimizerConfig};
use crate::envelope::ErrorCode;
use crate::grid::{checked_grid, GridError, ParamSpace};
use crate::leaderboard::{rank, LeaderboardEntry, Objective, RunSummary, ScoredRun};
use crate::pool::{BoundedPool, CancelToken, PoolError, RunPolicy};
use crate::sink::{MetricsSink, NoopSink};
use crate::walk_forward::{run_walk_forward, WalkForwardConfig, WalkForwardError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("invalid engine options: {0}")]
    Options(#[from] OptionsError),
    #[error("invalid concurrency: {0}")]
    Concurrency(String),
    #[error("combination {index}: strategy build failed: {source}")]
    Strategy {
        index: usize,
        #[source]
        source: StrategyError,
    },
    #[error("combination {index}: backtest failed: {source}")]
    Engine {
        index: usize,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    WalkForward(#[from] WalkForwardError),
    #[error("all {0} combinations failed")]
    AllFailed(usize),
    #[error("optimization cancelled")]
    Cancelled,
    #[error("worker pool error: {0}")]
    Pool(PoolError),
}

impl From<PoolError> for OptimizeError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Cancelled => Self::Cancelled,
            other => Self::Pool(other),
        }
    }
}

impl From<ConfigError> for OptimizeError {
    fn from(e: ConfigError) -> Self {
        Self::Concurrency(e.to_string())
    }
}

impl OptimizeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Grid(GridError::EmptyGrid) => ErrorCode::EmptyGrid,
            Self::Grid(GridError::GridTooLarge { .. }) => ErrorCode::GridTooLarge,
            _ => ErrorCode::OptimizeError,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Grid(GridError::GridTooLarge { limit, .. }) => Some(*limit),
            _ => None,
        }
    }
}

/// Wall-clock timing of one optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub total_ms: u64,
    pub avg_per_run_ms: f64,
    /// Combinations per hour at the observed average; 0 when too fast to measure.
    pub throughput_per_hour: f64,
}

impl Timing {
    fn measure(started: Instant, combinations: usize) -> Self {
        let elapsed = started.elapsed();
        let total_ms = elapsed.as_millis() as u64;
        let avg_per_run_ms = if combinations == 0 {
            0.0
        } else {
            elapsed.as_secs_f64() * 1_000.0 / combinations as f64
        };
        let throughput_per_hour = if avg_per_run_ms > 0.0 {
            3_600_000.0 / avg_per_run_ms
        } else {
            0.0
        };
        Self {
            total_ms,
            avg_per_run_ms,
            throughput_per_hour,
        }
    }
}

/// A combination that failed under `CollectPartial`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedCombination {
    pub index: usize,
    pub params: Params,
    pub error: String,
}

/// Outcome of one optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub symbol: String,
    pub timeframe: String,
    pub start: String,
    pub end: String,
    pub exchange: String,
    pub strategy: String,
    pub grid: ParamSpace,
    pub objective: Objective,
    pub total_combinations: usize,
    pub completed: usize,
    pub concurrency: usize,
    pub best_params: Params,
    pub best_score: f64,
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedCombination>,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub timing: Timing,
}

/// Grid-search driver. Holds limits and the metrics sink; stateless across calls.
pub struct Optimizer {
    config: OptimizerConfig,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer").field("config", &self.config).finish()
    }
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the whole grid described by `request` over `bars`.
    ///
    /// Failures are reported to the metrics sink with their boundary code
    /// before being returned.
    pub fn optimize(
        &self,
        bars: &[Bar],
        request: &OptimizeRequest,
        factory: &dyn StrategyFactory,
        cancel: &CancelToken,
    ) -> Result<OptimizationResult, OptimizeError> {
        let span = tracing::info_span!(
            "optimize",
            symbol = %request.symbol,
            strategy = %request.strategy,
            objective = %request.objective,
        );
        let _guard = span.enter();

        let outcome = self.optimize_inner(bars, request, factory, cancel);
        match &outcome {
            Ok(result) => {
                self.sink.record_run(result.objective, result.total_combinations);
                self.sink.record_latency(result.total_combinations, result.timing.total_ms);
                tracing::info!(
                    combinations = result.total_combinations,
                    completed = result.completed,
                    best_score = result.best_score,
                    total_ms = result.timing.total_ms,
                    "optimization finished"
                );
            }
            Err(e) => {
                self.sink.record_error(e.code());
                tracing::warn!(code = %e.code(), error = %e, "optimization failed");
            }
        }
        outcome
    }

    fn optimize_inner(
        &self,
        bars: &[Bar],
        request: &OptimizeRequest,
        factory: &dyn StrategyFactory,
        cancel: &CancelToken,
    ) -> Result<OptimizationResult, OptimizeError> {
        let started = Instant::now();

        // ─── Phase 1: Validate ───
        request.engine.validate()?;
        let concurrency = self.config.effective_concurrency(request.concurrency)?;
        let grid = checked_grid(&request.space, self.config.max_combinations)?;
        let policy = request.policy.unwrap_or(self.config.policy);
        if let Some(cfg) = &request.walk_forward {
            cfg.validate()?;
        }
        tracing::info!(
            combinations = grid.len(),
            concurrency,
            ?policy,
            bars = bars.len(),
            "grid validated"
        );

        // ─── Phase 2: Execute ───
        let pool = BoundedPool::new(concurrency)?;
        let task = |index: usize, params: &Params| run_combination(index, params, bars, request, factory);

        let (runs, failures) = match policy {
            RunPolicy::FailFast => (pool.try_run(&grid, cancel, task)?, Vec::new()),
            RunPolicy::CollectPartial => {
                let mut runs = Vec::with_capacity(grid.len());
                let mut failures = Vec::new();
                for (index, outcome) in pool.run_partial(&grid, cancel, task)?.into_iter().enumerate() {
                    match outcome {
                        Ok(run) => runs.push(run),
                        Err(e) => failures.push(FailedCombination {
                            index,
                            params: grid[index].clone(),
                            error: e.to_string(),
                        }),
                    }
                }
                (runs, failures)
            }
        };

        // ─── Phase 3: Rank ───
        let ranking =
            rank(&runs, request.objective, self.config.top_k).ok_or(OptimizeError::AllFailed(grid.len()))?;

        // ─── Phase 4: Screen ───
        let leaderboard = match &request.walk_forward {
            Some(cfg) => screen_overfit(&pool, cancel, bars, request, factory, cfg, ranking.entries)?,
            None => ranking.entries,
        };

        // ─── Phase 5: Report ───
        Ok(OptimizationResult {
            symbol: request.symbol.clone(),
            timeframe: request.timeframe.clone(),
            start: request.start.clone(),
            end: request.end.clone(),
            exchange: request.exchange.clone(),
            strategy: request.strategy.clone(),
            grid: request.space.clone(),
            objective: request.objective,
            total_combinations: grid.len(),
            completed: runs.len(),
            concurrency,
            best_params: ranking.best_params,
            best_score: ranking.best_score,
            leaderboard,
            failures,
            dataset_hash: dataset_hash(bars),
            bar_count: bars.len(),
            timing: Timing::measure(started, grid.len()),
        })
    }
}

/// Build a fresh strategy for one combination and simulate it.
fn run_combination(
    index: usize,
    params: &Params,
    bars: &[Bar],
    request: &OptimizeRequest,
    factory: &dyn StrategyFactory,
) -> Result<ScoredRun, OptimizeError> {
    let mut strategy = factory
        .build(params)
        .map_err(|source| OptimizeError::Strategy { index, source })?;
    let result = run_backtest(bars, strategy.as_mut(), &request.engine)
        .map_err(|source| OptimizeError::Engine { index, source })?;
    tracing::debug!(index, sharpe = result.sharpe, pnl = result.pnl, "combination finished");
    Ok(ScoredRun {
        params: params.clone(),
        summary: RunSummary::from(&result),
    })
}

/// Attach a walk-forward verdict to every entry, then drop the overfit ones.
///
/// If every entry is overfit the leaderboard is kept whole. An entry whose
/// walk-forward fails stays, without a verdict.
fn screen_overfit(
    pool: &BoundedPool,
    cancel: &CancelToken,
    bars: &[Bar],
    request: &OptimizeRequest,
    factory: &dyn StrategyFactory,
    cfg: &WalkForwardConfig,
    entries: Vec<LeaderboardEntry>,
) -> Result<Vec<LeaderboardEntry>, OptimizeError> {
    let outcomes = pool.run_partial(&entries, cancel, |_, entry: &LeaderboardEntry| {
        run_walk_forward(bars, factory, &entry.params, &request.engine, cfg)
    })?;

    let screened = entries.into_iter().zip(outcomes).map(|(mut entry, outcome)| {
        match outcome {
            Ok(report) => entry.wfo = Some(report.overfitting),
            Err(e) => tracing::warn!(rank = entry.rank, error = %e, "walk-forward failed, entry kept"),
        }
        entry
    });
    let (overfit, kept): (Vec<_>, Vec<_>) =
        screened.partition(|entry| entry.wfo.is_some_and(|o| o.detected));

    tracing::info!(kept = kept.len(), overfit = overfit.len(), "walk-forward screen finished");
    if kept.is_empty() {
        Ok(overfit)
    } else {
        Ok(kept)
    }
}
