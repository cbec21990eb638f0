//! Per-provider defaults for OpenAI-compatible providers.
//!
//! Each provider that speaks the OpenAI chat completions protocol gets a
//! factory function returning an [`OpenAiCompatConfig`] with the correct
//! base URL and known models.

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Provider name used as registry key (e.g., "openai", "gemini").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: String,
    /// Default model identifier.
    pub model: String,
    /// Models advertised through `get_models`.
    pub models: Vec<String>,
}

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// OpenAI default configuration.
pub fn openai_defaults(api_key: &str, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key: api_key.into(),
        model: model.into(),
        models: vec!["gpt-4o-mini".into(), "gpt-4o".into(), "gpt-4.1-mini".into()],
    }
}

/// Google Gemini default configuration (OpenAI-compatible beta endpoint).
pub fn gemini_defaults(api_key: &str, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "gemini".into(),
        base_url: GEMINI_BASE_URL.into(),
        api_key: api_key.into(),
        model: model.into(),
        models: vec!["gemini-2.5-flash".into(), "gemini-2.5-pro".into()],
    }
}

/// Any other endpoint speaking the protocol.
pub fn custom(provider_name: &str, base_url: &str, api_key: &str, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: provider_name.into(),
        base_url: base_url.into(),
        api_key: api_key.into(),
        model: model.into(),
        models: Vec::new(),
    }
}
