//! Broker state — cash, position, the T+1 pending queue and the fill log.
//!
//! The broker is the only place cash and position change. Every fill either
//! applies completely (cash, position and fill log together) or not at all.

use std::collections::VecDeque;

use crate::domain::{Bar, Fill, Order, OrderSide, OrderType, SkipReason, Timestamp};
use crate::engine::cost_model::CostModel;
use crate::engine::state::{CashMode, EngineOptions};

/// Mutable account state owned by the fill engine for one run.
#[derive(Debug, Clone)]
pub struct BrokerState {
    cash: f64,
    position: f64,
    pending: VecDeque<Order>,
    fills: Vec<Fill>,
    same_bar_fills: usize,
    skipped_orders: usize,
    cost: CostModel,
    cash_mode: CashMode,
    max_position: Option<f64>,
}

impl BrokerState {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            cash: options.initial_cash,
            position: 0.0,
            pending: VecDeque::new(),
            fills: Vec::new(),
            same_bar_fills: 0,
            skipped_orders: 0,
            cost: options.cost_model(),
            cash_mode: options.cash_mode,
            max_position: options.max_position,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn same_bar_fills(&self) -> usize {
        self.same_bar_fills
    }

    pub fn skipped_orders(&self) -> usize {
        self.skipped_orders
    }

    /// Mark-to-market equity: `cash + position * price`.
    pub fn equity(&self, mark_price: f64) -> f64 {
        self.cash + self.position * mark_price
    }

    /// Fill every order deferred from the previous bar at this bar's open.
    ///
    /// Orders are drained in submission order; a constraint violation drops
    /// the order and counts it as skipped. Returns the number of fills.
    pub fn fill_pending_at_open(&mut self, bar: &Bar) -> usize {
        let mut filled = 0;
        while let Some(order) = self.pending.pop_front() {
            match self.execute(order.side, order.quantity, bar.open, bar.timestamp) {
                Ok(()) => filled += 1,
                Err(reason) => self.skip(reason),
            }
        }
        filled
    }

    /// Route one order submitted during `bar`.
    ///
    /// - invalid orders are skipped
    /// - market orders are queued for the next open when `defer_market` is set,
    ///   otherwise filled at this bar's close
    /// - limit orders fill now if the bar's range touches the limit, otherwise
    ///   they are dropped without being counted
    pub fn process_submitted(&mut self, order: Order, bar: &Bar, defer_market: bool) {
        if let Err(reason) = order.validate() {
            self.skip(reason);
            return;
        }

        let raw_price = match order.order_type {
            OrderType::Market if defer_market => {
                self.pending.push_back(order);
                return;
            }
            OrderType::Market => bar.close,
            OrderType::Limit { limit_price } => match touched_price(order.side, limit_price, bar) {
                Some(price) => price,
                None => return,
            },
        };

        match self.execute(order.side, order.quantity, raw_price, bar.timestamp) {
            Ok(()) => {
                if order.is_market() {
                    self.same_bar_fills += 1;
                }
            }
            Err(reason) => self.skip(reason),
        }
    }

    /// Drop orders still waiting for a next bar. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Apply slippage, fee and constraints, then update cash, position and the fill log.
    fn execute(
        &mut self,
        side: OrderSide,
        quantity: f64,
        raw_price: f64,
        timestamp: Timestamp,
    ) -> Result<(), SkipReason> {
        let price = self.cost.fill_price(raw_price, side);
        let fee = self.cost.fee(price, quantity);
        if !price.is_finite() || !fee.is_finite() {
            return Err(SkipReason::NonFinitePrice);
        }
        let notional = price * quantity;

        if side == OrderSide::Buy {
            if self.cash_mode == CashMode::Strict && self.cash < notional + fee {
                return Err(SkipReason::InsufficientCash);
            }
            if let Some(max) = self.max_position {
                if self.position + quantity > max {
                    return Err(SkipReason::PositionLimit);
                }
            }
        }

        match side {
            OrderSide::Buy => {
                self.cash -= notional + fee;
                self.position += quantity;
            }
            OrderSide::Sell => {
                self.cash += notional - fee;
                self.position -= quantity;
            }
        }
        self.fills.push(Fill {
            timestamp,
            side,
            price,
            quantity,
            fee,
        });
        Ok(())
    }

    fn skip(&mut self, reason: SkipReason) {
        tracing::trace!(%reason, "order skipped");
        self.skipped_orders += 1;
    }

    pub(crate) fn into_fills(self) -> Vec<Fill> {
        self.fills
    }
}

/// Reference price for a limit order resolved against a single bar.
///
/// Buy: touched when `limit >= low`, fills at `min(limit, close)`.
/// Sell: touched when `limit <= high`, fills at `max(limit, close)`.
fn touched_price(side: OrderSide, limit_price: f64, bar: &Bar) -> Option<f64> {
    match side {
        OrderSide::Buy if limit_price >= bar.low => Some(limit_price.min(bar.close)),
        OrderSide::Sell if limit_price <= bar.high => Some(limit_price.max(bar.close)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(1_000, open, high, low, close, 0.0)
    }

    #[test]
    fn deferred_market_buy_fills_at_next_open_with_costs() {
        let opts = EngineOptions::new(1000.0).with_costs(10.0, 5.0);
        let mut broker = BrokerState::new(&opts);

        broker.process_submitted(Order::market(0, OrderSide::Buy, 1.0), &bar(90.0, 91.0, 89.0, 90.0), true);
        assert_eq!(broker.pending_len(), 1);
        assert!(broker.fills().is_empty());

        let filled = broker.fill_pending_at_open(&bar(100.0, 101.0, 99.0, 100.0));
        assert_eq!(filled, 1);
        let fill = broker.fills()[0];
        assert!((fill.price - 100.05).abs() < 1e-9);
        assert!((fill.fee - 0.10005).abs() < 1e-9);
        assert!((broker.cash() - 899.84995).abs() < 1e-9);
        assert_eq!(broker.position(), 1.0);
        assert_eq!(broker.same_bar_fills(), 0);
    }

    #[test]
    fn strict_cash_skips_whole_order() {
        let opts = EngineOptions::new(50.0);
        let mut broker = BrokerState::new(&opts);

        broker.process_submitted(Order::market(0, OrderSide::Buy, 1.0), &bar(100.0, 100.0, 100.0, 100.0), false);
        assert!(broker.fills().is_empty());
        assert_eq!(broker.cash(), 50.0);
        assert_eq!(broker.position(), 0.0);
        assert_eq!(broker.skipped_orders(), 1);
    }

    #[test]
    fn margin_mode_allows_negative_cash() {
        let opts = EngineOptions::new(50.0).with_cash_mode(CashMode::Margin);
        let mut broker = BrokerState::new(&opts);

        broker.process_submitted(Order::market(0, OrderSide::Buy, 1.0), &bar(100.0, 100.0, 100.0, 100.0), false);
        assert_eq!(broker.fills().len(), 1);
        assert_eq!(broker.cash(), -50.0);
        assert_eq!(broker.same_bar_fills(), 1);
    }

    #[test]
    fn position_limit_blocks_buys_only() {
        let opts = EngineOptions::new(10_000.0).with_max_position(2.0);
        let mut broker = BrokerState::new(&opts);
        let b = bar(10.0, 10.0, 10.0, 10.0);

        broker.process_submitted(Order::market(0, OrderSide::Buy, 2.0), &b, false);
        broker.process_submitted(Order::market(0, OrderSide::Buy, 0.5), &b, false);
        assert_eq!(broker.position(), 2.0);
        assert_eq!(broker.skipped_orders(), 1);

        broker.process_submitted(Order::market(0, OrderSide::Sell, 5.0), &b, false);
        assert_eq!(broker.position(), -3.0);
        assert_eq!(broker.skipped_orders(), 1);
    }

    #[test]
    fn limit_buy_touch_fills_at_min_of_limit_and_close() {
        let mut broker = BrokerState::new(&EngineOptions::new(1000.0));
        let b = bar(100.0, 102.0, 95.0, 98.0);

        broker.process_submitted(Order::limit(0, OrderSide::Buy, 1.0, 99.0), &b, true);
        assert_eq!(broker.fills()[0].price, 98.0);

        broker.process_submitted(Order::limit(0, OrderSide::Buy, 1.0, 96.0), &b, true);
        assert_eq!(broker.fills()[1].price, 96.0);
        assert_eq!(broker.same_bar_fills(), 0);
    }

    #[test]
    fn limit_sell_touch_fills_at_max_of_limit_and_close() {
        let opts = EngineOptions::new(1000.0).with_cash_mode(CashMode::Margin);
        let mut broker = BrokerState::new(&opts);
        let b = bar(100.0, 102.0, 95.0, 98.0);

        broker.process_submitted(Order::limit(0, OrderSide::Sell, 1.0, 101.0), &b, true);
        assert_eq!(broker.fills()[0].price, 101.0);

        broker.process_submitted(Order::limit(0, OrderSide::Sell, 1.0, 97.0), &b, true);
        assert_eq!(broker.fills()[1].price, 98.0);
    }

    #[test]
    fn untouched_limit_is_dropped_without_skip() {
        let mut broker = BrokerState::new(&EngineOptions::new(1000.0));
        let b = bar(100.0, 102.0, 95.0, 98.0);

        broker.process_submitted(Order::limit(0, OrderSide::Buy, 1.0, 90.0), &b, true);
        broker.process_submitted(Order::limit(0, OrderSide::Sell, 1.0, 110.0), &b, true);
        assert!(broker.fills().is_empty());
        assert_eq!(broker.pending_len(), 0);
        assert_eq!(broker.skipped_orders(), 0);
    }

    #[test]
    fn malformed_order_is_counted_not_fatal() {
        let mut broker = BrokerState::new(&EngineOptions::new(1000.0));
        let b = bar(100.0, 100.0, 100.0, 100.0);

        broker.process_submitted(Order::market(0, OrderSide::Buy, f64::NAN), &b, true);
        broker.process_submitted(Order::limit(0, OrderSide::Buy, 1.0, -1.0), &b, true);
        assert_eq!(broker.skipped_orders(), 2);
        assert_eq!(broker.pending_len(), 0);
    }

    #[test]
    fn discard_pending_clears_queue() {
        let mut broker = BrokerState::new(&EngineOptions::new(1000.0));
        let b = bar(100.0, 100.0, 100.0, 100.0);
        broker.process_submitted(Order::market(0, OrderSide::Buy, 1.0), &b, true);
        broker.process_submitted(Order::market(0, OrderSide::Sell, 1.0), &b, true);
        assert_eq!(broker.discard_pending(), 2);
        assert_eq!(broker.pending_len(), 0);
    }
}
