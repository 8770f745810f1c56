//! Grid builder — Cartesian product of candidate parameter values.
//!
//! The parameter space is an ordered map `name -> [candidates]`. Key order is
//! preserved from the request, and the last key varies fastest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use gridlab_core::Params;

/// Ordered parameter space: name -> candidate values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpace(pub serde_json::Map<String, Value>);

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter's candidate list, keeping first-insert order.
    pub fn with(mut self, name: &str, candidates: Vec<Value>) -> Self {
        self.0.insert(name.to_string(), Value::Array(candidates));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Candidate slice for each key. A non-array value counts as no candidates.
    fn axes(&self) -> Vec<(&str, &[Value])> {
        self.0
            .iter()
            .map(|(k, v)| match v {
                Value::Array(items) => (k.as_str(), items.as_slice()),
                _ => (k.as_str(), &[][..]),
            })
            .collect()
    }

    /// Number of combinations, or `None` on overflow. Zero when the space
    /// is empty or any axis has no candidates.
    pub fn combination_count(&self) -> Option<usize> {
        let axes = self.axes();
        if axes.is_empty() {
            return Some(0);
        }
        axes.iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
    }
}

/// Validation failures raised before any simulation starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Grid space produced no combinations")]
    EmptyGrid,
    #[error("Grid has {size} combinations, limit is {limit}")]
    GridTooLarge { size: usize, limit: usize },
}

/// Build every combination. Empty space or any empty axis yields no rows.
pub fn build_grid(space: &ParamSpace) -> Vec<Params> {
    let axes = space.axes();
    if axes.is_empty() || axes.iter().any(|(_, values)| values.is_empty()) {
        return Vec::new();
    }

    let mut grid: Vec<Params> = vec![Params::new()];
    for (key, values) in axes {
        let mut next = Vec::with_capacity(grid.len() * values.len());
        for row in &grid {
            for value in values {
                let mut combo = row.clone();
                combo.insert(key.to_string(), value.clone());
                next.push(combo);
            }
        }
        grid = next;
    }
    grid
}

/// Size-check the space against `limit`, then build it.
///
/// The product is computed with overflow-checked multiplication before any
/// row is materialized, so an oversized space costs nothing.
pub fn checked_grid(space: &ParamSpace, limit: usize) -> Result<Vec<Params>, GridError> {
    match space.combination_count() {
        Some(0) => Err(GridError::EmptyGrid),
        Some(size) if size > limit => Err(GridError::GridTooLarge { size, limit }),
        Some(_) => Ok(build_grid(space)),
        // saturated
        None => Err(GridError::GridTooLarge {
            size: usize::MAX,
            limit,
        }),
    }
}
