//! GridLab Core — bar types, strategy trait, fill engine, broker state, run metrics.
//!
//! This crate contains the deterministic single-run simulator:
//! - Domain types (bars, orders, fills)
//! - Strategy plug-in trait with a read-only broker snapshot
//! - Bar-by-bar fill engine with T+1 market fills, same-bar limit resolution,
//!   slippage/fee costs and cash/position constraints
//! - Post-run metrics (drawdown, per-bar Sharpe, win rate, turnover, exposure)
//! - Bar feed helpers (CSV, synthetic series, dataset hashing)
//!
//! A run is synchronous and CPU-bound. It borrows the bar slice immutably and
//! owns all mutable state, so many runs can share one feed across threads.

pub mod data;
pub mod domain;
pub mod engine;
pub mod metrics;
pub mod strategy;

pub use domain::{Bar, Fill, Order, OrderSide, OrderType};
pub use engine::{run_backtest, CashMode, EngineError, EngineOptions, RunResult};
pub use strategy::{Params, Strategy, StrategyContext, StrategyError, StrategyFactory};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across pool workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<Order>();
        require_sync::<Order>();
        require_send::<Fill>();
        require_sync::<Fill>();
        require_send::<EngineOptions>();
        require_sync::<EngineOptions>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<EngineError>();
        require_sync::<EngineError>();
        require_send::<strategy::BuiltinFactory>();
        require_sync::<strategy::BuiltinFactory>();
        require_send::<engine::BrokerState>();
        require_sync::<engine::BrokerState>();
    }

    /// Compile-time check: `on_bar` sees one bar, never the feed.
    ///
    /// The callback signature takes `&Bar`, not `&[Bar]` plus an index, so a
    /// strategy cannot index into bars it has not been shown yet.
    #[allow(dead_code)]
    fn strategy_callback_has_no_feed_parameter(s: &mut dyn Strategy, bar: &Bar, ctx: &mut StrategyContext<'_>) {
        s.on_bar(bar, ctx);
    }
}
