//! Simple moving average crossover.
//!
//! - Buy `quantity` when the fast SMA of closes crosses above the slow SMA and
//!   the book is flat or short
//! - Sell the whole long position when the fast SMA crosses below the slow SMA
//!
//! Closes are accumulated from `on_bar` calls, so the signal at bar t only
//! uses closes 0..=t.

use serde_json::json;

use crate::domain::{Bar, OrderSide};
use crate::strategy::{Strategy, StrategyContext, StrategyError};

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast_period: usize,
    slow_period: usize,
    quantity: f64,
    closes: Vec<f64>,
}

/// Direction of a detected cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Bullish,
    Bearish,
}

impl SmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize, quantity: f64) -> Result<Self, StrategyError> {
        if fast_period == 0 {
            return Err(StrategyError::invalid("fast", "must be > 0"));
        }
        if slow_period <= fast_period {
            return Err(StrategyError::invalid("slow", "must be greater than fast"));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(StrategyError::invalid("quantity", "must be finite and > 0"));
        }
        Ok(Self {
            fast_period,
            slow_period,
            quantity,
            closes: Vec::new(),
        })
    }

    pub fn fast_period(&self) -> usize {
        self.fast_period
    }

    pub fn slow_period(&self) -> usize {
        self.slow_period
    }

    fn sma(closes: &[f64], period: usize) -> Option<f64> {
        if closes.len() < period {
            return None;
        }
        let recent = &closes[closes.len() - period..];
        Some(recent.iter().sum::<f64>() / period as f64)
    }

    fn detect_cross(&self) -> Option<Cross> {
        if self.closes.len() < self.slow_period + 1 {
            return None;
        }
        let fast_now = Self::sma(&self.closes, self.fast_period)?;
        let slow_now = Self::sma(&self.closes, self.slow_period)?;

        let prev = &self.closes[..self.closes.len() - 1];
        let fast_prev = Self::sma(prev, self.fast_period)?;
        let slow_prev = Self::sma(prev, self.slow_period)?;

        if fast_prev <= slow_prev && fast_now > slow_now {
            Some(Cross::Bullish)
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Some(Cross::Bearish)
        } else {
            None
        }
    }
}

impl Strategy for SmaCrossover {
    fn on_bar(&mut self, bar: &Bar, ctx: &mut StrategyContext<'_>) {
        self.closes.push(bar.close);

        if let (Some(fast), Some(slow)) = (
            Self::sma(&self.closes, self.fast_period),
            Self::sma(&self.closes, self.slow_period),
        ) {
            ctx.metrics.mark("fast_sma", fast);
            ctx.metrics.mark("slow_sma", slow);
        }

        let position = ctx.broker.position();
        match self.detect_cross() {
            Some(Cross::Bullish) if position <= 0.0 => {
                ctx.broker.market(ctx.clock.now, OrderSide::Buy, self.quantity);
                ctx.state.insert("last_cross".into(), json!("bullish"));
            }
            Some(Cross::Bearish) if position > 0.0 => {
                ctx.broker.market(ctx.clock.now, OrderSide::Sell, position);
                ctx.state.insert("last_cross".into(), json!("bearish"));
            }
            _ => {}
        }
    }
}
