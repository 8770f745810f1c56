use super::order::OrderSide;
use super::Timestamp;
use serde::{Deserialize, Serialize};

/// Fill record. Append-only: never modified after it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: Timestamp,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
}

impl Fill {
    /// Gross traded value, `|price * quantity|`.
    pub fn notional(&self) -> f64 {
        (self.price * self.quantity).abs()
    }
}
