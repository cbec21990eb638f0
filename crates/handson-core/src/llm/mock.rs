//! Scripted provider for tests and offline runs.
//!
//! `MockProvider` answers with fixed content, a fixed error, or an echo of
//! the last user message, and reports configurable token counts, cost and
//! latency. Call counts and received requests are shared through `Arc`s so
//! tests can inspect them after the provider is boxed into a registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handson_types::llm::{
    GenerationRequest, GenerationResult, LlmError, MessageRole, ToolCall,
};

use super::provider::LlmProvider;

#[derive(Debug, Clone)]
enum Behavior {
    Respond(String),
    Fail(LlmError),
    Echo,
}

/// Deterministic in-process provider.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    model: String,
    behavior: Behavior,
    tool_calls: Vec<ToolCall>,
    tokens_input: u32,
    tokens_output: u32,
    cost_usd: f64,
    latency_ms: u64,
    delay: Option<Duration>,
    key_valid: bool,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockProvider {
    fn with_behavior(name: impl Into<String>, behavior: Behavior) -> Self {
        let name = name.into();
        Self {
            model: format!("{name}-mock"),
            name,
            behavior,
            tool_calls: Vec::new(),
            tokens_input: 10,
            tokens_output: 20,
            cost_usd: 0.0,
            latency_ms: 0,
            delay: None,
            key_valid: true,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `content`.
    pub fn responding(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Respond(content.into()))
    }

    /// Always fail with `error`.
    pub fn failing(name: impl Into<String>, error: LlmError) -> Self {
        Self::with_behavior(name, Behavior::Fail(error))
    }

    /// Answer with `[name] <last user message>`.
    pub fn echo(name: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Echo)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Flat cost reported for every call.
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    /// Latency reported in the result. Does not sleep.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Actually sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_tokens(mut self, tokens_input: u32, tokens_output: u32) -> Self {
        self.tokens_input = tokens_input;
        self.tokens_output = tokens_output;
        self
    }

    /// Answer with tool calls and no content.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Make `validate_key` report the key as rejected.
    pub fn with_invalid_key(mut self) -> Self {
        self.key_valid = false;
        self
    }

    /// Shared counter of `generate` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared log of every request received by `generate`.
    pub fn request_log(&self) -> Arc<Mutex<Vec<GenerationRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("mock request log lock poisoned")
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let content = match &self.behavior {
            Behavior::Fail(e) => return Err(e.clone()),
            Behavior::Respond(_) | Behavior::Echo if !self.tool_calls.is_empty() => None,
            Behavior::Respond(text) => Some(text.clone()),
            Behavior::Echo => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("");
                Some(format!("[{}] {last_user}", self.name))
            }
        };

        Ok(GenerationResult::new(
            &self.name,
            model,
            content,
            self.tokens_input,
            self.tokens_output,
            self.calculate_cost(self.tokens_input, self.tokens_output),
            self.latency_ms,
        )
        .with_tool_calls(self.tool_calls.clone()))
    }

    async fn validate_key(&self) -> Result<bool, LlmError> {
        Ok(self.key_valid)
    }

    fn get_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }

    fn calculate_cost(&self, _tokens_input: u32, _tokens_output: u32) -> f64 {
        self.cost_usd
    }
}
