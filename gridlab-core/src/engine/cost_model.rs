//! Cost model — slippage and fee calculation.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Fees are symmetric per side in basis points of the slipped notional.

use crate::domain::OrderSide;

/// Execution friction in basis points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub slippage_bps: f64,
    pub fee_bps: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, fee_bps: f64) -> Self {
        Self {
            slippage_bps,
            fee_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a raw reference price.
    ///
    /// `price + slippage_bps / 1e4 * price * sign(side)`
    pub fn fill_price(&self, raw_price: f64, side: OrderSide) -> f64 {
        let slip = (self.slippage_bps / 1e4) * raw_price * side.sign();
        raw_price + slip
    }

    /// Fee for a fill: `|fill_price * quantity| * fee_bps / 1e4`.
    pub fn fee(&self, fill_price: f64, quantity: f64) -> f64 {
        (fill_price * quantity).abs() * (self.fee_bps / 1e4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_slippage_raises_price() {
        let cm = CostModel::new(5.0, 0.0);
        assert!((cm.fill_price(100.0, OrderSide::Buy) - 100.05).abs() < 1e-12);
    }

    #[test]
    fn sell_slippage_lowers_price() {
        let cm = CostModel::new(5.0, 0.0);
        assert!((cm.fill_price(100.0, OrderSide::Sell) - 99.95).abs() < 1e-12);
    }

    #[test]
    fn fee_is_bps_of_slipped_notional() {
        let cm = CostModel::new(5.0, 10.0);
        let price = cm.fill_price(100.0, OrderSide::Buy);
        assert!((cm.fee(price, 1.0) - 0.10005).abs() < 1e-12);
    }

    #[test]
    fn frictionless_is_identity() {
        let cm = CostModel::frictionless();
        assert_eq!(cm.fill_price(42.0, OrderSide::Buy), 42.0);
        assert_eq!(cm.fee(42.0, 10.0), 0.0);
    }
}
