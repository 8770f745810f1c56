//! Domain types for GridLab

pub mod bar;
pub mod fill;
pub mod order;

pub use bar::{Bar, BarError};
pub use fill::Fill;
pub use order::{Order, OrderSide, OrderType, SkipReason};

/// Bar timestamp in epoch milliseconds.
pub type Timestamp = i64;
