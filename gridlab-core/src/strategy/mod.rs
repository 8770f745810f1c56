//! Strategy plug-in interface.
//!
//! A strategy is a per-bar callback. It sees the current bar and a
//! [`StrategyContext`]: the simulation clock, a read-only snapshot of the
//! broker, a metrics marker and a free-form state bag. It cannot touch cash or
//! position directly; the only way to act is `ctx.broker.submit(order)`.
//!
//! Architecture contract: `on_bar` receives the current bar only. Strategies
//! that need history keep it themselves, so no callback can read bar t+1.

pub mod buy_and_hold;
pub mod factory;
pub mod sma_cross;

use std::collections::BTreeMap;

use crate::domain::{Order, OrderSide, Timestamp};

pub use buy_and_hold::BuyAndHold;
pub use factory::{BuiltinFactory, Params, StrategyError, StrategyFactory};
pub use sma_cross::SmaCrossover;

/// Free-form per-strategy state that survives across callbacks.
pub type StateBag = BTreeMap<String, serde_json::Value>;

/// A trading strategy driven bar by bar.
pub trait Strategy {
    /// Called once before the first bar.
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) {}

    /// Called once per bar, after deferred orders have been filled at the open.
    fn on_bar(&mut self, bar: &crate::domain::Bar, ctx: &mut StrategyContext<'_>);

    /// Called once after the last bar. Orders submitted here are discarded.
    fn on_end(&mut self, _ctx: &mut StrategyContext<'_>) {}
}

/// Simulation clock as seen by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub now: Timestamp,
}

/// Snapshot of the broker plus an order outbox.
#[derive(Debug)]
pub struct BrokerView<'a> {
    cash: f64,
    position: f64,
    outbox: &'a mut Vec<Order>,
}

impl<'a> BrokerView<'a> {
    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Queue an order. It is routed by the engine after the callback returns.
    pub fn submit(&mut self, order: Order) {
        self.outbox.push(order);
    }

    pub fn market(&mut self, timestamp: Timestamp, side: OrderSide, quantity: f64) {
        self.submit(Order::market(timestamp, side, quantity));
    }

    pub fn limit(&mut self, timestamp: Timestamp, side: OrderSide, quantity: f64, limit_price: f64) {
        self.submit(Order::limit(timestamp, side, quantity, limit_price));
    }
}

/// Named scalar marks recorded by the strategy; the last value per key wins.
#[derive(Debug)]
pub struct MetricsMarker<'a> {
    marks: &'a mut BTreeMap<String, f64>,
}

impl<'a> MetricsMarker<'a> {
    pub fn mark(&mut self, key: &str, value: f64) {
        self.marks.insert(key.to_string(), value);
    }
}

/// Everything a strategy may observe or do during a callback.
#[derive(Debug)]
pub struct StrategyContext<'a> {
    pub clock: Clock,
    pub broker: BrokerView<'a>,
    pub metrics: MetricsMarker<'a>,
    pub state: &'a mut StateBag,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        now: Timestamp,
        cash: f64,
        position: f64,
        outbox: &'a mut Vec<Order>,
        marks: &'a mut BTreeMap<String, f64>,
        state: &'a mut StateBag,
    ) -> Self {
        Self {
            clock: Clock { now },
            broker: BrokerView {
                cash,
                position,
                outbox,
            },
            metrics: MetricsMarker { marks },
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;

    struct Recorder;

    impl Strategy for Recorder {
        fn on_bar(&mut self, bar: &Bar, ctx: &mut StrategyContext<'_>) {
            ctx.broker.market(ctx.clock.now, OrderSide::Buy, 1.0);
            ctx.metrics.mark("close", bar.close);
            ctx.state.insert("seen".into(), serde_json::json!(true));
        }
    }

    #[test]
    fn context_routes_orders_marks_and_state() {
        let mut outbox = Vec::new();
        let mut marks = BTreeMap::new();
        let mut state = StateBag::new();
        let bar = Bar::new(5, 1.0, 1.0, 1.0, 2.5, 0.0);

        let mut strategy = Recorder;
        {
            let mut ctx = StrategyContext::new(bar.timestamp, 100.0, 0.0, &mut outbox, &mut marks, &mut state);
            strategy.init(&mut ctx);
            strategy.on_bar(&bar, &mut ctx);
            assert_eq!(ctx.broker.cash(), 100.0);
            assert_eq!(ctx.clock.now, 5);
        }

        assert_eq!(outbox, vec![Order::market(5, OrderSide::Buy, 1.0)]);
        assert_eq!(marks.get("close"), Some(&2.5));
        assert_eq!(state.get("seen"), Some(&serde_json::json!(true)));
    }
}
