//! Boundary envelope: `{ok: true, result}` or `{ok: false, code, error}`.

use serde::{Deserialize, Serialize};

use crate::optimizer::{OptimizationResult, OptimizeError};

/// Machine-readable failure code at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyGrid,
    GridTooLarge,
    OptimizeError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyGrid => "EMPTY_GRID",
            Self::GridTooLarge => "GRID_TOO_LARGE",
            Self::OptimizeError => "OPTIMIZE_ERROR",
        }
    }

    /// HTTP status the collaborator service answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::EmptyGrid | Self::GridTooLarge => 400,
            Self::OptimizeError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body for one optimize request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OptimizationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Only set for `GRID_TOO_LARGE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl OptimizeResponse {
    pub fn success(result: OptimizationResult) -> Self {
        Self {
            ok: true,
            result: Some(result),
            code: None,
            error: None,
            limit: None,
        }
    }

    pub fn failure(err: &OptimizeError) -> Self {
        Self {
            ok: false,
            result: None,
            code: Some(err.code()),
            error: Some(err.to_string()),
            limit: err.limit(),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code.map_or(200, |c| c.http_status())
    }
}

impl From<Result<OptimizationResult, OptimizeError>> for OptimizeResponse {
    fn from(r: Result<OptimizationResult, OptimizeError>) -> Self {
        match r {
            Ok(result) => Self::success(result),
            Err(e) => Self::failure(&e),
        }
    }
}
