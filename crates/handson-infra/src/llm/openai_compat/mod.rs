//! OpenAI-compatible LLM provider implementation.
//!
//! A single [`OpenAiCompatibleProvider`] serves OpenAI, Google Gemini and
//! any other chat-completions endpoint via configurable base URLs.
//!
//! Uses [`async_openai`] for type-safe request/response handling.

pub mod config;

use std::time::Instant;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};

use handson_core::llm::provider::LlmProvider;
use handson_types::config::ProviderPricing;
use handson_types::llm::{GenerationRequest, GenerationResult, LlmError, Message, MessageRole};

use self::config::OpenAiCompatConfig;
use crate::llm::pricing::estimate_cost;

/// Unified provider for any OpenAI-compatible API.
///
/// Does NOT derive Debug: the API key lives inside the `async_openai::Client`.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
    models: Vec<String>,
    pricing: Vec<ProviderPricing>,
}

impl OpenAiCompatibleProvider {
    /// Create a new OpenAI-compatible provider from a configuration.
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            provider_name: config.provider_name,
            model: config.model,
            models: config.models,
            pricing: Vec::new(),
        }
    }

    /// Create an OpenAI provider (`https://api.openai.com/v1`).
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self::new(config::openai_defaults(api_key, model))
    }

    /// Create a Google Gemini provider (OpenAI-compatible beta endpoint).
    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self::new(config::gemini_defaults(api_key, model))
    }

    /// Pricing overrides consulted before the built-in table.
    pub fn with_pricing(mut self, pricing: Vec<ProviderPricing>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Build a [`CreateChatCompletionRequest`] from a generic [`GenerationRequest`].
    fn build_request(&self, request: &GenerationRequest) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }
        messages.extend(request.messages.iter().map(to_openai_message));

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        }
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
        name: None,
    })
}

fn to_openai_message(msg: &Message) -> ChatCompletionRequestMessage {
    match msg.role {
        MessageRole::System => system_message(&msg.content),
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        MessageRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let oai_request = self.build_request(request);
        let started = Instant::now();

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let latency_ms = started.elapsed().as_millis() as u64;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone());

        let (input, output) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let cost = estimate_cost(input, output, &response.model, &self.provider_name, &self.pricing);

        Ok(GenerationResult::new(
            &self.provider_name,
            response.model,
            content,
            input,
            output,
            cost,
            latency_ms,
        ))
    }

    async fn validate_key(&self) -> Result<bool, LlmError> {
        let ping = GenerationRequest {
            model: String::new(),
            messages: vec![Message::user("Hello")],
            system: None,
            max_tokens: 1,
            temperature: None,
        };
        match self
            .client
            .chat()
            .create(self.build_request(&ping))
            .await
            .map_err(map_openai_error)
        {
            Ok(_) => Ok(true),
            Err(LlmError::AuthenticationFailed) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn get_models(&self) -> Vec<String> {
        let mut models = self.models.clone();
        if !models.contains(&self.model) {
            models.insert(0, self.model.clone());
        }
        models
    }

    fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64 {
        estimate_cost(
            tokens_input,
            tokens_output,
            &self.model,
            &self.provider_name,
            &self.pricing,
        )
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || code == "authentication_error"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("API key not valid")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded {
                    max: 0,
                    requested: 0,
                }
            } else if code == "server_error" || error_type == "overloaded_error" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503) | Some(529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
