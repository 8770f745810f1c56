//! Bar — the fundamental market data unit.

use super::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for one fixed interval.
///
/// Bars are immutable once loaded and a series is ascending by `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Problems with a bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} has timestamp {timestamp} earlier than its predecessor {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: Timestamp,
        previous: Timestamp,
    },
    #[error("bar {index} has a non-finite price field")]
    NonFinite { index: usize },
}

impl Bar {
    pub fn new(timestamp: Timestamp, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Check that timestamps never go backwards.
pub fn check_ascending(bars: &[Bar]) -> Result<(), BarError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(BarError::OutOfOrder {
                index: i + 1,
                timestamp: pair[1].timestamp,
                previous: pair[0].timestamp,
            });
        }
    }
    Ok(())
}

/// Full feed validation: ascending timestamps and finite prices.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BarError> {
    check_ascending(bars)?;
    if let Some(index) = bars.iter().position(Bar::is_void) {
        return Err(BarError::NonFinite { index });
    }
    Ok(())
}
