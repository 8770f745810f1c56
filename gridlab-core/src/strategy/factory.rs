//! Strategy factory — builds a fresh strategy instance from a parameter map.
//!
//! Every grid combination gets its own instance, so no strategy state leaks
//! between runs.

use serde_json::Value;
use thiserror::Error;

use crate::strategy::{BuyAndHold, SmaCrossover, Strategy};

/// Parameter map for one strategy instance, in insertion order.
pub type Params = serde_json::Map<String, Value>;

/// Errors from strategy construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    Unknown(String),
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
}

impl StrategyError {
    pub fn invalid(name: &str, reason: &str) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Builds strategies for grid combinations. Shared read-only across pool workers.
pub trait StrategyFactory: Send + Sync {
    fn build(&self, params: &Params) -> Result<Box<dyn Strategy>, StrategyError>;
}

impl<F> StrategyFactory for F
where
    F: Fn(&Params) -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync,
{
    fn build(&self, params: &Params) -> Result<Box<dyn Strategy>, StrategyError> {
        self(params)
    }
}

/// Factories for the strategies shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFactory {
    /// Params: `fast` (default 10), `slow` (default 30), `quantity` (default 1.0).
    SmaCrossover,
    /// Params: `quantity` (default 1.0).
    BuyAndHold,
}

impl BuiltinFactory {
    pub fn from_name(name: &str) -> Result<Self, StrategyError> {
        match name {
            "sma_cross" | "sma_crossover" => Ok(Self::SmaCrossover),
            "buy_and_hold" => Ok(Self::BuyAndHold),
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SmaCrossover => "sma_cross",
            Self::BuyAndHold => "buy_and_hold",
        }
    }
}

impl StrategyFactory for BuiltinFactory {
    fn build(&self, params: &Params) -> Result<Box<dyn Strategy>, StrategyError> {
        match self {
            Self::SmaCrossover => {
                let fast = param_usize(params, "fast", 10)?;
                let slow = param_usize(params, "slow", 30)?;
                let quantity = param_f64(params, "quantity", 1.0)?;
                Ok(Box::new(SmaCrossover::new(fast, slow, quantity)?))
            }
            Self::BuyAndHold => {
                let quantity = param_f64(params, "quantity", 1.0)?;
                if !quantity.is_finite() || quantity <= 0.0 {
                    return Err(StrategyError::invalid("quantity", "must be finite and > 0"));
                }
                Ok(Box::new(BuyAndHold::new(quantity)))
            }
        }
    }
}

/// Read a non-negative integer parameter, falling back to `default` when absent.
pub fn param_usize(params: &Params, name: &str, default: usize) -> Result<usize, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize)
            .ok_or_else(|| StrategyError::invalid(name, "expected a non-negative integer")),
    }
}

/// Read a numeric parameter, falling back to `default` when absent.
pub fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| StrategyError::invalid(name, "expected a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn builds_sma_cross_with_defaults() {
        assert!(BuiltinFactory::SmaCrossover.build(&Params::new()).is_ok());
    }

    #[test]
    fn integral_floats_are_accepted() {
        let p = params(json!({"fast": 5.0, "slow": 20}));
        assert_eq!(param_usize(&p, "fast", 0), Ok(5));
        assert_eq!(param_usize(&p, "slow", 0), Ok(20));
    }

    #[test]
    fn bad_param_types_are_rejected() {
        let p = params(json!({"fast": "ten"}));
        assert!(matches!(
            BuiltinFactory::SmaCrossover.build(&p),
            Err(StrategyError::InvalidParam { .. })
        ));
        let p = params(json!({"fast": 2.5}));
        assert!(param_usize(&p, "fast", 0).is_err());
    }

    #[test]
    fn fast_must_be_below_slow() {
        let p = params(json!({"fast": 30, "slow": 10}));
        assert!(BuiltinFactory::SmaCrossover.build(&p).is_err());
    }

    #[test]
    fn names_round_trip() {
        for f in [BuiltinFactory::SmaCrossover, BuiltinFactory::BuyAndHold] {
            assert_eq!(BuiltinFactory::from_name(f.name()), Ok(f));
        }
        assert!(matches!(
            BuiltinFactory::from_name("martingale"),
            Err(StrategyError::Unknown(_))
        ));
    }

    #[test]
    fn closures_are_factories() {
        let factory = |_: &Params| -> Result<Box<dyn Strategy>, StrategyError> {
            Ok(Box::new(BuyAndHold::new(1.0)))
        };
        assert!(factory.build(&Params::new()).is_ok());
    }
}
