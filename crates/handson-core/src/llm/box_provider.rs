//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. Define an object-safe `LlmProviderDyn` trait with boxed futures
//! 2. Blanket-impl `LlmProviderDyn` for all `T: LlmProvider`
//! 3. `BoxLlmProvider` wraps `Box<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use handson_types::llm::{GenerationRequest, GenerationResult, LlmError};

use super::provider::LlmProvider;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationResult, LlmError>> + Send + 'a>>;

    fn validate_key_boxed(&self) -> Pin<Box<dyn Future<Output = Result<bool, LlmError>> + Send + '_>>;

    fn get_models(&self) -> Vec<String>;

    fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn model(&self) -> &str {
        LlmProvider::model(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationResult, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(request))
    }

    fn validate_key_boxed(&self) -> Pin<Box<dyn Future<Output = Result<bool, LlmError>> + Send + '_>> {
        Box::pin(self.validate_key())
    }

    fn get_models(&self) -> Vec<String> {
        LlmProvider::get_models(self)
    }

    fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64 {
        LlmProvider::calculate_cost(self, tokens_input, tokens_output)
    }
}

/// Type-erased LLM provider for runtime provider selection.
///
/// Since `LlmProvider` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxLlmProvider` exposes the same methods and delegates to the
/// inner `LlmProviderDyn` trait object.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    /// Wrap a concrete `LlmProvider` in a type-erased box.
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        self.inner.generate_boxed(request).await
    }

    pub async fn validate_key(&self) -> Result<bool, LlmError> {
        self.inner.validate_key_boxed().await
    }

    pub fn get_models(&self) -> Vec<String> {
        self.inner.get_models()
    }

    pub fn calculate_cost(&self, tokens_input: u32, tokens_output: u32) -> f64 {
        self.inner.calculate_cost(tokens_input, tokens_output)
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .field("model", &self.model())
            .finish()
    }
}
