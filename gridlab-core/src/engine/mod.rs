//! Backtesting engine — bar-by-bar simulation clock and fill engine.
//!
//! Per bar:
//! 1. Start-of-bar: fill market orders deferred from the previous bar at this bar's open
//! 2. Strategy callback: the strategy reads a broker snapshot and submits orders
//! 3. Order processing: defer market orders (T+1), resolve limit orders against the bar's range
//! 4. Post-bar: mark-to-market and append equity

pub mod broker;
pub mod cost_model;
pub mod loop_runner;
pub mod state;

pub use broker::BrokerState;
pub use cost_model::CostModel;
pub use loop_runner::{run_backtest, EngineError};
pub use state::{CashMode, EngineOptions, OptionsError, RunResult};
