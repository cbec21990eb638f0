//! Configuration types for Hands On AI.
//!
//! `GlobalConfig` is the top-level `handson.toml`: dispatch settings, the
//! provider table, and optional pricing overrides. All fields have defaults.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderType;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Provider definitions. Empty means "use the built-in defaults".
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,

    /// Pricing overrides for cost estimation per provider/model.
    #[serde(default)]
    pub provider_pricing: Vec<ProviderPricing>,
}

impl GlobalConfig {
    /// Provider definitions, falling back to the built-in table when none are configured.
    pub fn provider_settings(&self) -> Vec<ProviderSettings> {
        if self.providers.is_empty() {
            ProviderSettings::builtin()
        } else {
            self.providers.clone()
        }
    }
}

/// Engine-level settings, fixed at engine construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Provider names to load, in registry order.
    #[serde(default = "default_enabled_providers")]
    pub enabled_providers: Vec<String>,

    /// Fan out concurrently in `process_parallel` (sequential when false).
    #[serde(default = "default_true")]
    pub parallel_execution: bool,

    /// Use round-robin selection for single-shot calls.
    #[serde(default = "default_true")]
    pub use_round_robin: bool,

    #[serde(default = "default_max_requests_per_day")]
    pub max_requests_per_day: u64,

    #[serde(default = "default_max_tokens_per_day")]
    pub max_tokens_per_day: u64,

    #[serde(default = "default_max_cost_per_day_usd")]
    pub max_cost_per_day_usd: f64,

    /// Provider that judges board evaluations. `None` uses normal selection.
    #[serde(default = "default_board_evaluator_provider")]
    pub board_evaluator_provider: Option<String>,

    /// Model override for the evaluator call.
    #[serde(default)]
    pub board_evaluator_model: Option<String>,

    /// Upper bound for a single provider call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub default_temperature: Option<f64>,
}

fn default_enabled_providers() -> Vec<String> {
    vec!["openai".to_string(), "anthropic".to_string(), "gemini".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_requests_per_day() -> u64 {
    1_000
}

fn default_max_tokens_per_day() -> u64 {
    1_000_000
}

fn default_max_cost_per_day_usd() -> f64 {
    10.0
}

fn default_board_evaluator_provider() -> Option<String> {
    Some("openai".to_string())
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4_096
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled_providers: default_enabled_providers(),
            parallel_execution: true,
            use_round_robin: true,
            max_requests_per_day: default_max_requests_per_day(),
            max_tokens_per_day: default_max_tokens_per_day(),
            max_cost_per_day_usd: default_max_cost_per_day_usd(),
            board_evaluator_provider: default_board_evaluator_provider(),
            board_evaluator_model: None,
            request_timeout_secs: default_request_timeout_secs(),
            default_max_tokens: default_max_tokens(),
            default_temperature: None,
        }
    }
}

/// Definition of one provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Unique key (e.g., "openai", "anthropic", "gemini").
    pub name: String,
    pub provider_type: ProviderType,
    /// Default model for this provider.
    pub model: String,
    /// Override the provider's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Defaults to `<NAME>_API_KEY`.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderSettings {
    /// Environment variable name for this provider's API key.
    pub fn api_key_env_name(&self) -> String {
        self.api_key_env.clone().unwrap_or_else(|| {
            format!("{}_API_KEY", self.name.to_uppercase().replace('-', "_"))
        })
    }

    /// Built-in provider table: OpenAI, Anthropic, Google Gemini.
    pub fn builtin() -> Vec<ProviderSettings> {
        vec![
            ProviderSettings {
                name: "openai".to_string(),
                provider_type: ProviderType::OpenAiCompatible,
                model: "gpt-4o-mini".to_string(),
                base_url: None,
                api_key_env: None,
            },
            ProviderSettings {
                name: "anthropic".to_string(),
                provider_type: ProviderType::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
                base_url: None,
                api_key_env: None,
            },
            ProviderSettings {
                name: "gemini".to_string(),
                provider_type: ProviderType::OpenAiCompatible,
                model: "gemini-2.5-flash".to_string(),
                base_url: None,
                api_key_env: None,
            },
        ]
    }
}

/// Cost information for a specific provider/model pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPricing {
    /// Name of the provider (e.g., "anthropic", "openai").
    pub provider_name: String,
    /// Model name prefix (e.g., "claude-sonnet-4").
    pub model_pattern: String,
    /// Cost per million input tokens in USD.
    pub input_cost_per_million: f64,
    /// Cost per million output tokens in USD.
    pub output_cost_per_million: f64,
}
