//! Optimizer limits and the serializable optimize request.
//!
//! Limits come from defaults overridden by `OPTIMIZER_MAX_COMBINATIONS` and
//! `OPTIMIZER_MAX_CONCURRENCY`. A request is loaded from TOML or JSON and
//! carries the market descriptor, the parameter space, the objective, the
//! engine options and an optional walk-forward screen.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gridlab_core::EngineOptions;

use crate::grid::ParamSpace;
use crate::leaderboard::{Objective, DEFAULT_TOP_K};
use crate::pool::RunPolicy;
use crate::walk_forward::WalkForwardConfig;

pub const ENV_MAX_COMBINATIONS: &str = "OPTIMIZER_MAX_COMBINATIONS";
pub const ENV_MAX_CONCURRENCY: &str = "OPTIMIZER_MAX_CONCURRENCY";

pub const DEFAULT_MAX_COMBINATIONS: usize = 500;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported request format '{0}' (expected .toml or .json)")]
    UnknownFormat(String),
    #[error("{var}: expected a positive integer, got '{value}'")]
    Env { var: &'static str, value: String },
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

// ─── Optimizer limits ────────────────────────────────────────────────

/// Process-level optimizer limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Largest grid accepted; bigger grids are rejected, never truncated.
    pub max_combinations: usize,
    /// Upper bound on worker count; request concurrency is clamped to it.
    pub max_concurrency: usize,
    /// Leaderboard length.
    pub top_k: usize,
    pub policy: RunPolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            top_k: DEFAULT_TOP_K,
            policy: RunPolicy::FailFast,
        }
    }
}

impl OptimizerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden through `lookup`. Unset or empty values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(n) = parse_positive(&lookup, ENV_MAX_COMBINATIONS)? {
            config.max_combinations = n;
        }
        if let Some(n) = parse_positive(&lookup, ENV_MAX_CONCURRENCY)? {
            config.max_concurrency = n;
        }
        Ok(config)
    }

    /// Worker count for a request: clamped to `max_concurrency`, 0 rejected.
    pub fn effective_concurrency(&self, requested: Option<usize>) -> Result<usize, ConfigError> {
        match requested {
            Some(0) => Err(ConfigError::ZeroConcurrency),
            Some(n) => Ok(n.min(self.max_concurrency)),
            None => Ok(self.max_concurrency),
        }
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::Env { var, value: raw }),
    }
}

// ─── Optimize request ────────────────────────────────────────────────

/// One grid-search request.
///
/// The market descriptor fields are echoed into the result; the bars
/// themselves are supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub symbol: String,
    pub timeframe: String,
    pub start: String,
    pub end: String,
    pub exchange: String,
    /// Strategy name understood by `BuiltinFactory::from_name`.
    pub strategy: String,
    pub space: ParamSpace,
    pub objective: Objective,
    /// Requested worker count; clamped to the configured maximum.
    pub concurrency: Option<usize>,
    /// Overrides the configured run policy.
    pub policy: Option<RunPolicy>,
    pub engine: EngineOptions,
    /// Walk-forward every leaderboard entry and drop the overfit ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_forward: Option<WalkForwardConfig>,
}

impl Default for OptimizeRequest {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".into(),
            timeframe: "1h".into(),
            start: "2024-01-01".into(),
            end: "2024-02-01".into(),
            exchange: "binance".into(),
            strategy: "sma_cross".into(),
            space: ParamSpace::default(),
            objective: Objective::default(),
            concurrency: None,
            policy: None,
            engine: EngineOptions::default(),
            walk_forward: None,
        }
    }
}

impl OptimizeRequest {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Self::from_toml(&content),
            "json" => Self::from_json(&content),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}
