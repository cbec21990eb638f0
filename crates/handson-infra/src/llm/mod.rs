//! LLM provider implementations.
//!
//! Concrete implementations of the [`LlmProvider`] trait defined in
//! `handson-core`: Anthropic Claude over its Messages API and every
//! OpenAI-compatible endpoint (OpenAI, Google Gemini, self-hosted).
//!
//! Also provides the provider factory ([`create_provider`], [`BuiltinFactory`])
//! and [`load_registry`], which builds the registry the engine runs on.
//!
//! [`LlmProvider`]: handson_core::llm::provider::LlmProvider

pub mod anthropic;
pub mod openai_compat;
pub mod pricing;

use secrecy::SecretString;

use handson_core::llm::box_provider::BoxLlmProvider;
use handson_core::llm::mock::MockProvider;
use handson_core::llm::registry::{ProviderFactory, ProviderRegistry};
use handson_types::config::{GlobalConfig, ProviderPricing, ProviderSettings};
use handson_types::llm::{LlmError, ProviderType};

use self::anthropic::AnthropicProvider;
use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::{self as oai_config, OpenAiCompatConfig};

/// Create a [`BoxLlmProvider`] from [`ProviderSettings`].
///
/// `api_key` is the resolved secret value. Mock providers need none; every
/// other type fails with [`LlmError::NotConfigured`] naming the environment
/// variable to set.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: Option<&str>,
    pricing: &[ProviderPricing],
) -> Result<BoxLlmProvider, LlmError> {
    let require_key = || {
        api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::NotConfigured(format!("set {}", settings.api_key_env_name())))
    };

    match settings.provider_type {
        ProviderType::Anthropic => {
            let secret = SecretString::from(require_key()?.to_string());
            let mut provider = AnthropicProvider::new(secret, settings.model.clone())?
                .with_name(settings.name.clone())
                .with_pricing(pricing.to_vec());
            if let Some(ref base_url) = settings.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::OpenAiCompatible => {
            let key = require_key()?;
            let config = openai_compat_config(settings, key);
            let provider = OpenAiCompatibleProvider::new(config).with_pricing(pricing.to_vec());
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::Mock => Ok(BoxLlmProvider::new(
            MockProvider::echo(settings.name.clone()).with_model(settings.model.clone()),
        )),
    }
}

/// Use `base_url` if specified, otherwise infer from the provider name.
///
/// The registry name is always kept so results report the configured name.
fn openai_compat_config(settings: &ProviderSettings, key: &str) -> OpenAiCompatConfig {
    let defaults = match settings.name.as_str() {
        "gemini" => oai_config::gemini_defaults(key, &settings.model),
        _ => oai_config::openai_defaults(key, &settings.model),
    };

    match settings.base_url.as_deref() {
        Some(base_url) => oai_config::custom(&settings.name, base_url, key, &settings.model),
        None => OpenAiCompatConfig {
            provider_name: settings.name.clone(),
            ..defaults
        },
    }
}

type KeySource = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// [`ProviderFactory`] over the built-in adapters.
///
/// API keys are looked up by environment variable name; tests inject a
/// closure instead of touching the process environment.
pub struct BuiltinFactory {
    key_source: KeySource,
    pricing: Vec<ProviderPricing>,
}

impl BuiltinFactory {
    /// Resolve keys from the process environment.
    pub fn from_env(pricing: Vec<ProviderPricing>) -> Self {
        Self::with_key_source(pricing, |var| std::env::var(var).ok())
    }

    pub fn with_key_source<F>(pricing: Vec<ProviderPricing>, key_source: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key_source: Box::new(key_source),
            pricing,
        }
    }
}

impl ProviderFactory for BuiltinFactory {
    fn create(&self, settings: &ProviderSettings) -> Result<BoxLlmProvider, LlmError> {
        let key = (self.key_source)(&settings.api_key_env_name());
        create_provider(settings, key.as_deref(), &self.pricing)
    }
}

/// Build the provider registry for a loaded configuration.
///
/// Keys come from the environment (load `.env` first if wanted).
pub fn load_registry(config: &GlobalConfig) -> ProviderRegistry {
    let factory = BuiltinFactory::from_env(config.provider_pricing.clone());
    load_registry_with(config, &factory)
}

/// [`load_registry`] with an explicit factory.
pub fn load_registry_with(config: &GlobalConfig, factory: &dyn ProviderFactory) -> ProviderRegistry {
    let registry = ProviderRegistry::load(
        &config.provider_settings(),
        &config.dispatch.enabled_providers,
        factory,
    );
    tracing::info!(
        loaded = registry.len(),
        available = registry.available_names().len(),
        "Provider registry ready"
    );
    registry
}
