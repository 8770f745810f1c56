//! End-to-end engine scenarios: T+1 deferral, cost arithmetic, constraints,
//! limit handling and strategy lifecycle hooks.

use gridlab_core::domain::{Bar, Order, OrderSide};
use gridlab_core::engine::{run_backtest, CashMode, EngineOptions};
use gridlab_core::strategy::{BuyAndHold, SmaCrossover, Strategy, StrategyContext};
use gridlab_core::data::synthetic_bars;

// ── Helpers ──────────────────────────────────────────────────────────

fn bar(ts: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(ts, open, high, low, close, 1_000.0)
}

/// Submits the orders listed for each bar index.
struct Scripted {
    per_bar: Vec<Vec<Order>>,
    on_init: Vec<Order>,
    on_end: Vec<Order>,
    seen: usize,
    cash_seen: Vec<f64>,
    position_seen: Vec<f64>,
}

impl Scripted {
    fn new(per_bar: Vec<Vec<Order>>) -> Self {
        Self {
            per_bar,
            on_init: vec![],
            on_end: vec![],
            seen: 0,
            cash_seen: vec![],
            position_seen: vec![],
        }
    }
}

impl Strategy for Scripted {
    fn init(&mut self, ctx: &mut StrategyContext<'_>) {
        for o in &self.on_init {
            ctx.broker.submit(*o);
        }
    }

    fn on_bar(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) {
        self.cash_seen.push(ctx.broker.cash());
        self.position_seen.push(ctx.broker.position());
        if let Some(orders) = self.per_bar.get(self.seen) {
            for o in orders {
                ctx.broker.submit(*o);
            }
        }
        self.seen += 1;
    }

    fn on_end(&mut self, ctx: &mut StrategyContext<'_>) {
        for o in &self.on_end {
            ctx.broker.submit(*o);
        }
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn single_bar_market_buy_never_fills() {
    let bars = vec![bar(0, 100.0, 101.0, 99.0, 100.0)];
    let mut s = Scripted::new(vec![vec![Order::market(0, OrderSide::Buy, 1.0)]]);
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(1_000.0)).unwrap();

    assert!(result.fills.is_empty());
    assert_eq!(result.cash, 1_000.0);
    assert_eq!(result.equity_history, vec![1_000.0]);
    assert_eq!(result.skipped_order_count, 0);
}

#[test]
fn fee_and_slippage_arithmetic() {
    let bars = vec![
        bar(0, 95.0, 96.0, 94.0, 95.0),
        bar(1, 100.0, 101.0, 99.0, 100.0),
    ];
    let mut s = Scripted::new(vec![vec![Order::market(0, OrderSide::Buy, 1.0)]]);
    let opts = EngineOptions::new(1_000.0).with_costs(10.0, 5.0);
    let result = run_backtest(&bars, &mut s, &opts).unwrap();

    assert_eq!(result.fills.len(), 1);
    let fill = result.fills[0];
    assert!((fill.price - 100.05).abs() < 1e-9);
    assert!((fill.fee - 0.10005).abs() < 1e-9);
    assert!((result.cash - 899.84995).abs() < 1e-9);
    assert_eq!(fill.timestamp, 1);
    assert_eq!(result.same_bar_fill_count, 0);
    // equity at bar 1 marks the position at the close
    assert!((result.equity_history[1] - (899.84995 + 100.0)).abs() < 1e-9);
    assert!((result.pnl - (899.84995 + 100.0 - 1_000.0)).abs() < 1e-9);
}

#[test]
fn deferred_orders_fill_in_submission_order() {
    let bars = vec![bar(0, 10.0, 10.0, 10.0, 10.0), bar(1, 10.0, 10.0, 10.0, 10.0)];
    let mut s = Scripted::new(vec![vec![
        Order::market(0, OrderSide::Buy, 5.0),
        Order::market(0, OrderSide::Buy, 6.0),
        Order::market(0, OrderSide::Sell, 2.0),
    ]]);
    // 100 cash covers the first buy (50) but not the second (60)
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(100.0)).unwrap();

    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.fills[0].quantity, 5.0);
    assert_eq!(result.fills[1].side, OrderSide::Sell);
    assert_eq!(result.position, 3.0);
    assert_eq!(result.skipped_order_count, 1);
    assert_eq!(result.cash, 70.0);
}

#[test]
fn untouched_limit_does_not_rest() {
    // bar 0 range [95, 105]; limit buy at 90 is not touched. bar 1 trades at 80,
    // which would touch it if it rested, but it was dropped on bar 0.
    let bars = vec![bar(0, 100.0, 105.0, 95.0, 100.0), bar(1, 85.0, 86.0, 80.0, 82.0)];
    let mut s = Scripted::new(vec![vec![Order::limit(0, OrderSide::Buy, 1.0, 90.0)]]);
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(1_000.0)).unwrap();

    assert!(result.fills.is_empty());
    assert_eq!(result.skipped_order_count, 0);
}

#[test]
fn touched_limit_fills_same_bar_with_slippage() {
    let bars = vec![bar(0, 100.0, 105.0, 95.0, 98.0)];
    let mut s = Scripted::new(vec![vec![Order::limit(0, OrderSide::Buy, 1.0, 99.0)]]);
    let opts = EngineOptions::new(1_000.0).with_costs(0.0, 10.0);
    let result = run_backtest(&bars, &mut s, &opts).unwrap();

    assert_eq!(result.fills.len(), 1);
    // min(99, 98) = 98, plus 10 bps
    assert!((result.fills[0].price - 98.098).abs() < 1e-9);
    assert_eq!(result.same_bar_fill_count, 0);
}

#[test]
fn init_orders_route_on_first_bar_and_end_orders_are_discarded() {
    let bars = vec![bar(0, 10.0, 10.0, 10.0, 10.0), bar(1, 11.0, 11.0, 11.0, 11.0)];
    let mut s = Scripted::new(vec![]);
    s.on_init = vec![Order::market(0, OrderSide::Buy, 1.0)];
    s.on_end = vec![Order::market(1, OrderSide::Sell, 1.0)];
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(100.0)).unwrap();

    assert_eq!(result.fills.len(), 1);
    assert_eq!(result.fills[0].price, 11.0);
    assert_eq!(result.position, 1.0);
    assert_eq!(result.exposure, 11.0);
}

#[test]
fn broker_snapshot_reflects_open_fills() {
    let bars = vec![
        bar(0, 10.0, 10.0, 10.0, 10.0),
        bar(1, 20.0, 20.0, 20.0, 20.0),
        bar(2, 20.0, 20.0, 20.0, 20.0),
    ];
    let mut s = Scripted::new(vec![vec![Order::market(0, OrderSide::Buy, 2.0)]]);
    run_backtest(&bars, &mut s, &EngineOptions::new(100.0)).unwrap();

    // the deferred buy fills at bar 1's open before bar 1's callback runs
    assert_eq!(s.position_seen, vec![0.0, 2.0, 2.0]);
    assert_eq!(s.cash_seen, vec![100.0, 60.0, 60.0]);
}

#[test]
fn strict_mode_rejects_without_partial_fill() {
    let bars = vec![bar(0, 10.0, 10.0, 10.0, 10.0), bar(1, 10.0, 10.0, 10.0, 10.0)];
    let mut s = Scripted::new(vec![vec![Order::market(0, OrderSide::Buy, 11.0)]]);
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(100.0)).unwrap();
    assert!(result.fills.is_empty());
    assert_eq!(result.position, 0.0);
    assert_eq!(result.skipped_order_count, 1);

    let mut s = Scripted::new(vec![vec![Order::market(0, OrderSide::Buy, 11.0)]]);
    let opts = EngineOptions::new(100.0).with_cash_mode(CashMode::Margin);
    let result = run_backtest(&bars, &mut s, &opts).unwrap();
    assert_eq!(result.position, 11.0);
    assert_eq!(result.cash, -10.0);
}

#[test]
fn buy_and_hold_tracks_the_market() {
    let bars = synthetic_bars("BH", 100, 0, 60_000);
    let mut s = BuyAndHold::new(1.0);
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(1_000.0)).unwrap();

    assert_eq!(result.trade_count, 1);
    assert_eq!(result.fills[0].price, bars[1].open);
    let last = bars.last().unwrap().close;
    assert!((result.final_equity - (1_000.0 - bars[1].open + last)).abs() < 1e-9);
    assert_eq!(result.equity_history.len(), bars.len());
}

#[test]
fn sma_crossover_runs_end_to_end() {
    let bars = synthetic_bars("SMA", 500, 0, 60_000);
    let mut s = SmaCrossover::new(5, 20, 1.0).unwrap();
    let result = run_backtest(&bars, &mut s, &EngineOptions::new(10_000.0).with_costs(5.0, 2.0))
        .unwrap();

    assert!(result.trade_count > 0);
    assert!(result.marks.contains_key("fast_sma"));
    assert!(result.marks.contains_key("slow_sma"));
    assert!(result.max_drawdown >= 0.0 && result.max_drawdown < 1.0);
    assert!(result.win_rate >= 0.0 && result.win_rate <= 1.0);
    assert_eq!(result.equity_history.len(), bars.len());
}
