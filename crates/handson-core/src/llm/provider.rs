//! LlmProvider trait definition.
//!
//! This is the adapter contract every backing LLM service implements.
//! Uses RPITIT for the async methods; [`super::box_provider::BoxLlmProvider`]
//! provides the object-safe wrapper used by the registry.

use std::future::Future;

use handson_types::llm::{GenerationRequest, GenerationResult, LlmError};

/// Trait for LLM provider backends (Anthropic, OpenAI-compatible, mock).
///
/// Each adapter translates the standardized [`GenerationRequest`] into its
/// own wire format and reports tokens, cost and latency back in a
/// [`GenerationResult`].
pub trait LlmProvider: Send + Sync {
    /// Provider name, used as the registry key (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Default model used when the request carries no override.
    fn model(&self) -> &str;

    /// Send a generation request and receive the standardized result.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, LlmError>> + Send;

    /// Check that the configured credentials are accepted by the backend.
    fn validate_key(&self) -> impl Future<Output = Result<bool, LlmError>> + Send;

    /// Models this provider can serve.
    fn get_models(&self) -> Vec<String>;

    /// Cost in USD for the given token counts, from the provider's pricing table.
    fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64;
}
