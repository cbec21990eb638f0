//! AnthropicProvider -- concrete [`LlmProvider`] implementation for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) and maps
//! the response into a [`GenerationResult`], including `tool_use` blocks.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use handson_core::llm::provider::LlmProvider;
use handson_types::config::ProviderPricing;
use handson_types::llm::{
    GenerationRequest, GenerationResult, LlmError, Message, MessageRole, ToolCall,
};

use super::types::{
    AnthropicContentBlock, AnthropicErrorResponse, AnthropicMessage, AnthropicRequest,
    AnthropicResponse,
};
use crate::llm::pricing::estimate_cost;

/// Default base URL of the Anthropic API.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const KNOWN_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-haiku-20241022",
];

/// Anthropic Claude LLM provider.
///
/// The API key is only exposed when constructing HTTP request headers.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    name: String,
    model: String,
    pricing: Vec<ProviderPricing>,
}

impl AnthropicProvider {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a new Anthropic provider registered as `"anthropic"`.
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            name: "anthropic".to_string(),
            model: model.into(),
            pricing: Vec::new(),
        })
    }

    /// Register under a different name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pricing overrides consulted before the built-in table.
    pub fn with_pricing(mut self, pricing: Vec<ProviderPricing>) -> Self {
        self.pricing = pricing;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a generic [`GenerationRequest`] into an [`AnthropicRequest`].
    ///
    /// System-role messages are folded into the top-level `system` field,
    /// which is the only place the Messages API accepts them.
    fn to_anthropic_request(&self, request: &GenerationRequest) -> AnthropicRequest {
        let mut system_parts: Vec<&str> = request.system.iter().map(String::as_str).collect();
        let mut messages = Vec::with_capacity(request.messages.len());

        for Message { role, content } in &request.messages {
            match role {
                MessageRole::System => system_parts.push(content),
                MessageRole::User | MessageRole::Assistant => messages.push(AnthropicMessage {
                    role: role.to_string(),
                    content: content.clone(),
                }),
            }
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        AnthropicRequest {
            model,
            max_tokens: request.max_tokens,
            messages,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            temperature: request.temperature,
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<AnthropicResponse, LlmError> {
        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorResponse>(&error_body)
                .map(|e| e.error.message)
                .unwrap_or(error_body);

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                529 => LlmError::Overloaded(message),
                400 => LlmError::InvalidRequest(message),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {message}"),
                },
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))
    }
}

/// Parse a `retry-after` header given in whole seconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1_000))
}

/// Response blocks sorted into text content and tool calls.
///
/// At most one of `content` and `tool_calls` is filled. Text sent
/// alongside tool calls lands in `preamble` instead of `content`.
#[derive(Debug, Default)]
struct SplitContent {
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    preamble: Option<String>,
}

fn split_content(blocks: Vec<AnthropicContentBlock>) -> SplitContent {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text: t } => text.push_str(&t),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input,
            }),
            AnthropicContentBlock::Other => {}
        }
    }

    if tool_calls.is_empty() {
        SplitContent {
            content: Some(text),
            ..Default::default()
        }
    } else {
        SplitContent {
            content: None,
            tool_calls,
            preamble: (!text.is_empty()).then_some(text),
        }
    }
}

// AnthropicProvider does NOT derive Debug so the key never reaches logs.

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let body = self.to_anthropic_request(request);
        let started = Instant::now();
        let response = self.send(&body).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            provider = %self.name,
            id = %response.id,
            stop_reason = ?response.stop_reason,
            "Anthropic response received"
        );

        let input = response.usage.input_tokens;
        let output = response.usage.output_tokens;
        let cost = estimate_cost(input, output, &response.model, &self.name, &self.pricing);
        let split = split_content(response.content);

        let mut result =
            GenerationResult::new(&self.name, response.model, split.content, input, output, cost, latency_ms)
                .with_tool_calls(split.tool_calls);
        if let Some(preamble) = split.preamble {
            result = result.with_metadata("preamble", serde_json::Value::String(preamble));
        }
        Ok(result)
    }

    async fn validate_key(&self) -> Result<bool, LlmError> {
        let ping = GenerationRequest {
            model: String::new(),
            messages: vec![Message::user("Hello")],
            system: None,
            max_tokens: 1,
            temperature: Some(0.0),
        };
        match self.send(&self.to_anthropic_request(&ping)).await {
            Ok(_) => Ok(true),
            Err(LlmError::AuthenticationFailed) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn get_models(&self) -> Vec<String> {
        let mut models: Vec<String> = KNOWN_MODELS.iter().map(|m| m.to_string()).collect();
        if !models.contains(&self.model) {
            models.insert(0, self.model.clone());
        }
        models
    }

    fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64 {
        estimate_cost(tokens_input, tokens_output, &self.model, &self.name, &self.pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> AnthropicProvider {
        AnthropicProvider::new(
            SecretString::from("test-key-not-real"),
            "claude-sonnet-4-20250514",
        )
        .unwrap()
    }

    fn request(messages: Vec<Message>, system: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            model: String::new(),
            messages,
            system: system.map(str::to_string),
            max_tokens: 1024,
            temperature: Some(0.7),
        }
    }

    #[test]
    fn test_provider_defaults() {
        let provider = make_provider();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-sonnet-4-20250514");
        assert_eq!(provider.get_models()[0], "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_to_anthropic_request_uses_configured_model() {
        let provider = make_provider();
        let req = provider.to_anthropic_request(&request(vec![Message::user("Hello")], Some("Be helpful")));
        assert_eq!(req.model, "claude-sonnet-4-20250514");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.system.as_deref(), Some("Be helpful"));
        assert_eq!(req.temperature, Some(0.7));
    }

    #[test]
    fn test_system_messages_fold_into_system_field() {
        let provider = make_provider();
        let mut req = request(
            vec![
                Message::system("Answer in French."),
                Message::user("Hello"),
                Message::assistant("Bonjour"),
                Message::user("How are you?"),
            ],
            Some("Be helpful"),
        );
        req.model = "claude-opus-4-20250514".to_string();

        let body = provider.to_anthropic_request(&req);
        assert_eq!(body.model, "claude-opus-4-20250514");
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.system.as_deref(), Some("Be helpful\n\nAnswer in French."));
    }

    #[test]
    fn test_split_content_tool_use_only() {
        let split = split_content(vec![AnthropicContentBlock::ToolUse {
            id: "toolu_1".into(),
            name: "search".into(),
            input: serde_json::json!({"q": "rust"}),
        }]);
        assert!(split.content.is_none());
        assert!(split.preamble.is_none());
        assert_eq!(split.tool_calls.len(), 1);
        assert_eq!(split.tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn test_split_content_text_before_tool_use_becomes_preamble() {
        let split = split_content(vec![
            AnthropicContentBlock::Text {
                text: "I'll search for that.".into(),
            },
            AnthropicContentBlock::ToolUse {
                id: "toolu_2".into(),
                name: "search".into(),
                input: serde_json::json!({"q": "tokio"}),
            },
        ]);
        assert!(split.content.is_none());
        assert_eq!(split.tool_calls.len(), 1);
        assert_eq!(split.tool_calls[0].name, "search");
        assert_eq!(split.preamble.as_deref(), Some("I'll search for that."));
    }

    #[test]
    fn test_retry_after_saturates_on_huge_values() {
        assert_eq!(parse_retry_after("30"), Some(30_000));
        assert_eq!(parse_retry_after(" 2 "), Some(2_000));
        assert_eq!(parse_retry_after(&u64::MAX.to_string()), Some(u64::MAX));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn test_split_content_text_joined() {
        let split = split_content(vec![
            AnthropicContentBlock::Text { text: "Hello ".into() },
            AnthropicContentBlock::Other,
            AnthropicContentBlock::Text { text: "world".into() },
        ]);
        assert_eq!(split.content.as_deref(), Some("Hello world"));
        assert!(split.tool_calls.is_empty());
        assert!(split.preamble.is_none());
    }

    #[test]
    fn test_base_url_override() {
        let provider = make_provider().with_base_url("http://localhost:8080/");
        assert_eq!(provider.url("/v1/messages"), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_calculate_cost_uses_pricing_table() {
        let provider = make_provider();
        let cost = provider.calculate_cost(1_000_000, 100_000);
        assert!((cost - 4.50).abs() < 0.001);
    }
}
