//! LLM request/response types for Hands On AI.
//!
//! These types model the data shapes exchanged with provider adapters:
//! generation requests, standardized generation results, tool calls,
//! provider descriptors, and provider-level errors.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking the content of a degraded result.
pub const DEGRADED_PREFIX: &str = "ERROR:";

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Request handed to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model override. Empty means "use the adapter's configured model".
    #[serde(default)]
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A tool invocation requested by the model instead of plain content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Function name.
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Standardized output of one provider call.
///
/// Built once per call through [`GenerationResult::new`] (or
/// [`GenerationResult::degraded`] for a failed call inside a batch) and not
/// mutated afterwards. `tokens_total` is always `tokens_input + tokens_output`
/// and `cost_usd` is rounded to 6 decimal places.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: Option<String>,
    pub provider: String,
    pub model: String,
    pub tokens_input: u32,
    pub tokens_output: u32,
    pub tokens_total: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationResult {
    /// Build a result, deriving `tokens_total` and rounding `cost_usd`.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        content: Option<String>,
        tokens_input: u32,
        tokens_output: u32,
        cost_usd: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            content,
            provider: provider.into(),
            model: model.into(),
            tokens_input,
            tokens_output,
            tokens_total: tokens_input.saturating_add(tokens_output),
            cost_usd: round_cost(cost_usd),
            latency_ms,
            timestamp: Utc::now(),
            tool_calls: None,
            metadata: HashMap::new(),
        }
    }

    /// Placeholder for a provider call that failed inside a batch.
    ///
    /// Content is `"ERROR: <message>"`; tokens and cost are zero.
    pub fn degraded(
        provider: impl Into<String>,
        model: impl Into<String>,
        error: &str,
        latency_ms: u64,
    ) -> Self {
        let mut result = Self::new(
            provider,
            model,
            Some(format!("{DEGRADED_PREFIX} {error}")),
            0,
            0,
            0.0,
            latency_ms,
        );
        result
            .metadata
            .insert("degraded".to_string(), serde_json::Value::Bool(true));
        result
    }

    /// Attach tool calls. An empty list leaves `tool_calls` unset.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        if !tool_calls.is_empty() {
            self.tool_calls = Some(tool_calls);
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether this result stands in for a failed call.
    pub fn is_degraded(&self) -> bool {
        self.content
            .as_deref()
            .is_some_and(|c| c.starts_with(DEGRADED_PREFIX))
    }

    /// Content as a string slice, empty when the call produced only tool calls.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Round a USD amount to 6 decimal places, clamping negatives to zero.
pub fn round_cost(cost: f64) -> f64 {
    if !cost.is_finite() || cost <= 0.0 {
        return 0.0;
    }
    (cost * 1_000_000.0).round() / 1_000_000.0
}

/// Errors from provider adapter operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("context length exceeded: max {max}, requested {requested}")]
    ContextLengthExceeded { max: u32, requested: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// Type of provider backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Anthropic,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    Mock,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::OpenAiCompatible => write!(f, "openai_compatible"),
            ProviderType::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(ProviderType::Anthropic),
            "openai_compatible" => Ok(ProviderType::OpenAiCompatible),
            "mock" => Ok(ProviderType::Mock),
            other => Err(format!("invalid provider type: '{other}'")),
        }
    }
}

/// Identity and availability of one backing provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub model: String,
    pub is_available: bool,
    pub last_error: Option<String>,
}

impl ProviderDescriptor {
    pub fn available(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            is_available: true,
            last_error: None,
        }
    }

    pub fn unavailable(
        name: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            is_available: false,
            last_error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_generation_result_totals_and_rounding() {
        let result = GenerationResult::new("alpha", "alpha-1", Some("hi".into()), 12, 30, 0.00012345678, 250);
        assert_eq!(result.tokens_total, 42);
        assert!((result.cost_usd - 0.000123).abs() < 1e-12);
        assert!(!result.is_degraded());
        assert!(result.tool_calls.is_none());
    }

    #[test]
    fn test_degraded_result_has_zero_usage() {
        let result = GenerationResult::degraded("beta", "beta-1", "connection refused", 10);
        assert!(result.is_degraded());
        assert!(result.text().starts_with("ERROR:"));
        assert!(result.text().contains("connection refused"));
        assert_eq!(result.tokens_total, 0);
        assert_eq!(result.cost_usd, 0.0);
        assert_eq!(result.metadata.get("degraded"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_tool_calls_only_result() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "README.md"}),
        };
        let result = GenerationResult::new("alpha", "m", None, 5, 5, 0.0, 1)
            .with_tool_calls(vec![call])
            .with_metadata("preamble", serde_json::json!("Reading the file."));
        assert!(result.content.is_none());
        assert_eq!(result.metadata["preamble"], "Reading the file.");
        assert_eq!(result.text(), "");
        assert_eq!(result.tool_calls.as_ref().map(Vec::len), Some(1));
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_empty_tool_calls_stay_unset() {
        let result = GenerationResult::new("alpha", "m", Some("x".into()), 0, 0, 0.0, 0).with_tool_calls(vec![]);
        assert!(result.tool_calls.is_none());
    }

    #[test]
    fn test_round_cost_clamps_negative_and_nan() {
        assert_eq!(round_cost(-1.0), 0.0);
        assert_eq!(round_cost(f64::NAN), 0.0);
        assert!((round_cost(1.2345678) - 1.234568).abs() < 1e-9);
    }

    #[test]
    fn test_generation_result_serde_timestamp_is_rfc3339() {
        let result = GenerationResult::new("alpha", "m", Some("x".into()), 1, 1, 0.0, 0);
        let json = serde_json::to_value(&result).unwrap();
        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_provider_type_roundtrip() {
        for pt in [ProviderType::Anthropic, ProviderType::OpenAiCompatible, ProviderType::Mock] {
            let parsed: ProviderType = pt.to_string().parse().unwrap();
            assert_eq!(pt, parsed);
        }
        assert!("bedrock".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout { after_ms: 5000 };
        assert_eq!(err.to_string(), "request timed out after 5000ms");
    }
}
