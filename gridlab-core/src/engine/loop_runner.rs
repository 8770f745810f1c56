//! Bar-by-bar event loop — the heart of the backtesting engine.
//!
//! Phases per bar t:
//! 1. Start-of-bar: fill orders deferred from bar t-1 at bar t's open
//! 2. Strategy: `on_bar` reads the broker snapshot and submits orders
//! 3. Routing: market orders are deferred (or filled at the close), limit
//!    orders are resolved against bar t's range or dropped
//! 4. Post-bar: append `cash + position * close` to the equity history
//!
//! Equity at bar t only ever depends on bars 0..=t. The single route from
//! bar t to bar t+1 is the explicit pending queue.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::bar::{check_ascending, BarError};
use crate::domain::{Bar, Order};
use crate::engine::broker::BrokerState;
use crate::engine::state::{EngineOptions, OptionsError, RunResult};
use crate::metrics::RunMetrics;
use crate::strategy::{StateBag, Strategy, StrategyContext};

/// Errors that abort a run. Skipped orders are not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid engine options: {0}")]
    Options(#[from] OptionsError),
    #[error("invalid bar feed: {0}")]
    Bars(#[from] BarError),
    #[error("non-finite {field} at bar {bar_index}")]
    NonFinite {
        field: &'static str,
        bar_index: usize,
    },
}

/// Run one backtest.
///
/// The bar slice is only read; the broker state is created here and dropped
/// when the `RunResult` snapshot is taken, so concurrent runs over the same
/// bars never share mutable state.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &mut dyn Strategy,
    options: &EngineOptions,
) -> Result<RunResult, EngineError> {
    options.validate()?;
    check_ascending(bars)?;

    let mut broker = BrokerState::new(options);
    let mut outbox: Vec<Order> = Vec::new();
    let mut marks: BTreeMap<String, f64> = BTreeMap::new();
    let mut state = StateBag::new();
    let mut equity_history = Vec::with_capacity(bars.len());
    let mut last_close = 0.0;

    {
        let now = bars.first().map_or(0, |b| b.timestamp);
        let mut ctx = StrategyContext::new(
            now,
            broker.cash(),
            broker.position(),
            &mut outbox,
            &mut marks,
            &mut state,
        );
        strategy.init(&mut ctx);
    }
    // No bar has been seen yet; route init orders against the first bar
    // exactly like orders from its own callback would be.
    let mut carried: Vec<Order> = std::mem::take(&mut outbox);

    for (t, bar) in bars.iter().enumerate() {
        last_close = bar.close;

        // ─── Phase 1: Start-of-bar ───
        if options.use_next_bar_open && t > 0 {
            broker.fill_pending_at_open(bar);
        }

        // ─── Phase 2: Strategy ───
        outbox.append(&mut carried);
        {
            let mut ctx = StrategyContext::new(
                bar.timestamp,
                broker.cash(),
                broker.position(),
                &mut outbox,
                &mut marks,
                &mut state,
            );
            strategy.on_bar(bar, &mut ctx);
        }

        // ─── Phase 3: Routing ───
        for order in outbox.drain(..) {
            broker.process_submitted(order, bar, options.use_next_bar_open);
        }

        // ─── Phase 4: Post-bar ───
        let equity = broker.equity(bar.close);
        if !equity.is_finite() {
            return Err(EngineError::NonFinite {
                field: "equity",
                bar_index: t,
            });
        }
        equity_history.push(equity);
    }

    {
        let now = bars.last().map_or(0, |b| b.timestamp);
        let mut ctx = StrategyContext::new(
            now,
            broker.cash(),
            broker.position(),
            &mut outbox,
            &mut marks,
            &mut state,
        );
        strategy.on_end(&mut ctx);
    }
    let dropped = outbox.len() + carried.len() + broker.discard_pending();
    if dropped > 0 {
        tracing::trace!(dropped, "orders left without a bar to fill at");
    }

    finalize(broker, equity_history, last_close, options, marks, bars.len())
}

fn finalize(
    broker: BrokerState,
    equity_history: Vec<f64>,
    last_close: f64,
    options: &EngineOptions,
    marks: BTreeMap<String, f64>,
    bar_count: usize,
) -> Result<RunResult, EngineError> {
    let cash = broker.cash();
    let position = broker.position();
    let same_bar_fill_count = broker.same_bar_fills();
    let skipped_order_count = broker.skipped_orders();
    let fills = broker.into_fills();

    let final_equity = cash + position * last_close;
    let pnl = final_equity - options.initial_cash;
    let last_index = bar_count.saturating_sub(1);
    for (field, value) in [("finalEquity", final_equity), ("pnl", pnl)] {
        if !value.is_finite() {
            return Err(EngineError::NonFinite {
                field,
                bar_index: last_index,
            });
        }
    }

    let metrics = RunMetrics::compute(&equity_history, &fills, position, last_close);
    if let Some(field) = metrics.first_non_finite() {
        return Err(EngineError::NonFinite {
            field,
            bar_index: last_index,
        });
    }

    Ok(RunResult {
        final_equity,
        cash,
        position,
        pnl,
        trade_count: metrics.trade_count,
        turnover: metrics.turnover,
        exposure: metrics.exposure,
        max_drawdown: metrics.max_drawdown,
        sharpe: metrics.sharpe,
        win_rate: metrics.win_rate,
        fills,
        equity_history,
        same_bar_fill_count,
        skipped_order_count,
        marks,
    })
}
