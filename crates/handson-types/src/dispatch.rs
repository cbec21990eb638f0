//! Dispatch-level types: errors, usage limits, merge and board outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::llm::{GenerationResult, LlmError, ProviderDescriptor};

/// Which daily ceiling a request would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCeiling {
    Requests,
    Tokens,
    Cost,
}

impl fmt::Display for UsageCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageCeiling::Requests => write!(f, "requests"),
            UsageCeiling::Tokens => write!(f, "tokens"),
            UsageCeiling::Cost => write!(f, "cost"),
        }
    }
}

/// A daily ceiling that has been reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitViolation {
    pub ceiling: UsageCeiling,
    pub message: String,
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Snapshot of the usage limiter for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatus {
    pub daily_requests: u64,
    pub max_requests_per_day: u64,
    pub daily_tokens: u64,
    pub max_tokens_per_day: u64,
    pub daily_cost_usd: f64,
    pub max_cost_per_day_usd: f64,
    pub last_reset_date: NaiveDate,
}

/// Errors surfaced by the dispatch engine.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("usage limit exceeded: {0}")]
    LimiterExceeded(LimitViolation),

    #[error("no provider available")]
    NoProviderAvailable,

    #[error("provider '{provider}' is not configured: {message}")]
    Configuration { provider: String, message: String },

    #[error("provider '{provider}' failed: {source}")]
    ProviderCall {
        provider: String,
        #[source]
        source: LlmError,
    },
}

/// How a merge result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// No results were given.
    Empty,
    /// Exactly one result, returned as-is.
    Single,
    /// Every result was degraded; the first one is returned.
    Fallback,
    /// Heuristic scoring picked the winner.
    AutoSelect,
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMethod::Empty => write!(f, "empty"),
            MergeMethod::Single => write!(f, "single"),
            MergeMethod::Fallback => write!(f, "fallback"),
            MergeMethod::AutoSelect => write!(f, "auto_select"),
        }
    }
}

/// Output of the response merger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub merged_content: Option<String>,
    pub method: MergeMethod,
    pub selected_provider: Option<String>,
    /// Per-provider scores; only set for `AutoSelect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<BTreeMap<String, i64>>,
}

/// Output of the board evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEvaluation {
    /// Recommended provider; `None` when unresolved or when evaluation failed.
    pub recommendation: Option<String>,
    pub reason: String,
    /// Evaluator text as returned, empty when no evaluator call was made.
    pub raw_evaluation: String,
    /// Evaluator provider that produced `raw_evaluation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    /// Failure of the evaluator call itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Combination strategy for [`DispatchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    Single,
    Merge,
    Board,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::Single => write!(f, "single"),
            CombineMode::Merge => write!(f, "merge"),
            CombineMode::Board => write!(f, "board"),
        }
    }
}

impl FromStr for CombineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(CombineMode::Single),
            "merge" => Ok(CombineMode::Merge),
            "board" => Ok(CombineMode::Board),
            other => Err(format!("invalid combine mode: '{other}'")),
        }
    }
}

/// A single answer plus a description of how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub content: Option<String>,
    pub provider: Option<String>,
    pub mode: CombineMode,
    /// Merge method, or `"board"` / `"single"` for the other modes.
    pub method: String,
    pub results: Vec<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardEvaluation>,
}

/// Engine diagnostics returned by `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub usage: UsageStatus,
    pub rotation_order: Vec<String>,
    pub rotations: u64,
    pub use_round_robin: bool,
    pub parallel_execution: bool,
    pub providers: Vec<ProviderDescriptor>,
}
