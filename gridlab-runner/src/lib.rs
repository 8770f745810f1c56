//! GridLab Runner — grid search orchestration on top of `gridlab-core`.
//!
//! This crate provides:
//! - Grid builder (ordered Cartesian product with a size cap)
//! - Bounded-concurrency pool with fail-fast / collect-partial policies and cancellation
//! - Leaderboard ranking by objective
//! - Optimizer driver with timing, dataset hash and an injectable metrics sink
//! - `{ok, result}` / `{ok, code, error}` response envelope
//! - Optimizer limits from the environment and TOML/JSON optimize requests
//! - Walk-forward validation with an overfitting check, optionally screening the leaderboard

pub mod config;
pub mod envelope;
pub mod grid;
pub mod leaderboard;
pub mod optimizer;
pub mod pool;
pub mod sink;
pub mod walk_forward;

pub use config::{ConfigError, OptimizeRequest, OptimizerConfig};
pub use envelope::{ErrorCode, OptimizeResponse};
pub use grid::{build_grid, checked_grid, GridError, ParamSpace};
pub use leaderboard::{rank, LeaderboardEntry, Objective, Ranking, RunSummary, ScoredRun};
pub use optimizer::{FailedCombination, OptimizationResult, OptimizeError, Optimizer, Timing};
pub use pool::{BoundedPool, CancelToken, PoolError, RunPolicy};
pub use sink::{CountingSink, MetricsSink, NoopSink, TracingSink};
pub use walk_forward::{
    build_folds, run_walk_forward, Fold, Overfitting, WalkForwardConfig, WalkForwardError, WalkForwardResult,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn optimizer_types_are_send_sync() {
        assert_send::<Optimizer>();
        assert_sync::<Optimizer>();
        assert_send::<OptimizationResult>();
        assert_sync::<OptimizationResult>();
        assert_send::<OptimizeError>();
        assert_sync::<OptimizeError>();
    }

    #[test]
    fn pool_types_are_send_sync() {
        assert_send::<BoundedPool>();
        assert_sync::<BoundedPool>();
        assert_send::<CancelToken>();
        assert_sync::<CancelToken>();
        assert_send::<CountingSink>();
        assert_sync::<CountingSink>();
    }

    #[test]
    fn request_types_are_send_sync() {
        assert_send::<OptimizeRequest>();
        assert_sync::<OptimizeRequest>();
        assert_send::<WalkForwardResult>();
        assert_sync::<WalkForwardResult>();
    }
}
