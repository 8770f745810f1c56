//! Orders submitted by strategies and the reasons an order can be skipped.

use super::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells. Slippage always moves the price against the taker.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

/// What kind of order and its price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderType {
    /// Fills at the next bar's open (T+1), or at this bar's close when
    /// next-bar-open execution is disabled.
    Market,
    /// Fills within the submitting bar if the bar's range touches the limit.
    /// Never rests on the book.
    Limit { limit_price: f64 },
}

/// A strategy order. Transient: consumed on the submitting bar or the next one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: Timestamp,
    pub side: OrderSide,
    pub quantity: f64,
    #[serde(flatten)]
    pub order_type: OrderType,
}

impl Order {
    pub fn market(timestamp: Timestamp, side: OrderSide, quantity: f64) -> Self {
        Self {
            timestamp,
            side,
            quantity,
            order_type: OrderType::Market,
        }
    }

    pub fn limit(timestamp: Timestamp, side: OrderSide, quantity: f64, limit_price: f64) -> Self {
        Self {
            timestamp,
            side,
            quantity,
            order_type: OrderType::Limit { limit_price },
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }

    /// Structural validation. A malformed order is skipped by the engine, never fatal.
    pub fn validate(&self) -> Result<(), SkipReason> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(SkipReason::InvalidQuantity);
        }
        if let OrderType::Limit { limit_price } = self.order_type {
            if !limit_price.is_finite() || limit_price <= 0.0 {
                return Err(SkipReason::InvalidLimitPrice);
            }
        }
        Ok(())
    }
}

/// Why an order was counted in `skipped_order_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidQuantity,
    InvalidLimitPrice,
    InsufficientCash,
    PositionLimit,
    NonFinitePrice,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidQuantity => "invalid quantity",
            Self::InvalidLimitPrice => "invalid limit price",
            Self::InsufficientCash => "insufficient cash",
            Self::PositionLimit => "position limit",
            Self::NonFinitePrice => "non-finite fill price",
        };
        f.write_str(s)
    }
}
