//! Buy-and-hold: one market buy on the first bar, then nothing.

use crate::domain::{Bar, OrderSide};
use crate::strategy::{Strategy, StrategyContext};

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    quantity: f64,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(quantity: f64) -> Self {
        Self {
            quantity,
            entered: false,
        }
    }
}

impl Strategy for BuyAndHold {
    fn on_bar(&mut self, _bar: &Bar, ctx: &mut StrategyContext<'_>) {
        if self.entered {
            return;
        }
        ctx.broker.market(ctx.clock.now, OrderSide::Buy, self.quantity);
        self.entered = true;
    }
}
