//! Provider registry for runtime provider lookup.
//!
//! An ordered, name-indexed table of boxed LLM providers plus their
//! availability descriptors. Providers that failed to construct are kept as
//! unavailable entries so explicit calls can report why.

use std::sync::Mutex;

use handson_types::config::ProviderSettings;
use handson_types::llm::{LlmError, ProviderDescriptor, ProviderType};

use super::box_provider::BoxLlmProvider;

/// Builds a provider instance from its settings.
///
/// Implemented by the infra crate for the real adapters; tests use a
/// [`FactoryTable`] of closures.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &ProviderSettings) -> Result<BoxLlmProvider, LlmError>;
}

type Constructor = Box<dyn Fn(&ProviderSettings) -> Result<BoxLlmProvider, LlmError> + Send + Sync>;

/// Explicit constructor table keyed by provider type.
#[derive(Default)]
pub struct FactoryTable {
    constructors: Vec<(ProviderType, Constructor)>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for a provider type, replacing any previous one.
    pub fn with<F>(mut self, provider_type: ProviderType, constructor: F) -> Self
    where
        F: Fn(&ProviderSettings) -> Result<BoxLlmProvider, LlmError> + Send + Sync + 'static,
    {
        self.constructors.retain(|(t, _)| *t != provider_type);
        self.constructors.push((provider_type, Box::new(constructor)));
        self
    }
}

impl ProviderFactory for FactoryTable {
    fn create(&self, settings: &ProviderSettings) -> Result<BoxLlmProvider, LlmError> {
        let constructor = self
            .constructors
            .iter()
            .find(|(t, _)| *t == settings.provider_type)
            .map(|(_, c)| c)
            .ok_or_else(|| {
                LlmError::NotConfigured(format!(
                    "no adapter for provider type '{}'",
                    settings.provider_type
                ))
            })?;
        constructor(settings)
    }
}

struct ProviderEntry {
    descriptor: Mutex<ProviderDescriptor>,
    provider: Option<BoxLlmProvider>,
}

/// Registry of LLM providers in load order.
///
/// The set of entries is fixed once loading is done; only descriptor status
/// (`is_available`, `last_error`) changes afterwards.
pub struct ProviderRegistry {
    entries: Vec<(String, ProviderEntry)>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Load every enabled provider through `factory`.
    ///
    /// Names without settings, and settings the factory rejects, become
    /// unavailable entries carrying the reason in `last_error`.
    pub fn load(
        settings: &[ProviderSettings],
        enabled: &[String],
        factory: &dyn ProviderFactory,
    ) -> Self {
        let mut registry = Self::new();

        for name in enabled {
            if registry.contains(name) {
                tracing::debug!(provider = %name, "Provider listed twice, skipping duplicate");
                continue;
            }

            let Some(provider_settings) = settings.iter().find(|s| &s.name == name) else {
                let reason = format!("no provider settings for '{name}'");
                tracing::warn!(provider = %name, %reason, "Provider not loaded");
                registry.register_unavailable(name.clone(), "", reason);
                continue;
            };

            match factory.create(provider_settings) {
                Ok(provider) => {
                    tracing::debug!(
                        provider = %name,
                        model = %provider.model(),
                        "Provider loaded"
                    );
                    registry.register(name.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "Provider not loaded");
                    registry.register_unavailable(
                        name.clone(),
                        provider_settings.model.clone(),
                        e.to_string(),
                    );
                }
            }
        }

        registry
    }

    /// Register a provider under the given name.
    ///
    /// If a provider with this name already exists, it is replaced.
    pub fn register(&mut self, name: impl Into<String>, provider: BoxLlmProvider) {
        let name = name.into();
        let descriptor = ProviderDescriptor::available(name.clone(), provider.model());
        self.insert(
            name,
            ProviderEntry {
                descriptor: Mutex::new(descriptor),
                provider: Some(provider),
            },
        );
    }

    /// Register a name whose provider could not be constructed.
    pub fn register_unavailable(
        &mut self,
        name: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
    ) {
        let name = name.into();
        let descriptor = ProviderDescriptor::unavailable(name.clone(), model, error);
        self.insert(
            name,
            ProviderEntry {
                descriptor: Mutex::new(descriptor),
                provider: None,
            },
        );
    }

    fn insert(&mut self, name: String, entry: ProviderEntry) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name, entry)),
        }
    }

    fn entry(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Whether `name` was registered, loaded or not.
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Look up a loaded provider by name, regardless of availability.
    pub fn get(&self, name: &str) -> Option<&BoxLlmProvider> {
        self.entry(name).and_then(|e| e.provider.as_ref())
    }

    /// Loaded and currently marked available.
    pub fn is_available(&self, name: &str) -> bool {
        self.entry(name)
            .is_some_and(|e| e.provider.is_some() && lock(&e.descriptor).is_available)
    }

    /// Names of loaded, available providers in load order.
    pub fn available_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.provider.is_some() && lock(&e.descriptor).is_available)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// All registered names in load order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<ProviderDescriptor> {
        self.entry(name).map(|e| lock(&e.descriptor).clone())
    }

    /// Snapshot of every descriptor in load order.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.entries
            .iter()
            .map(|(_, e)| lock(&e.descriptor).clone())
            .collect()
    }

    /// Store the latest failure without changing availability.
    pub fn record_error(&self, name: &str, error: impl Into<String>) {
        if let Some(entry) = self.entry(name) {
            lock(&entry.descriptor).last_error = Some(error.into());
        }
    }

    /// Flip a provider to unavailable and store the reason.
    pub fn mark_unavailable(&self, name: &str, error: impl Into<String>) {
        if let Some(entry) = self.entry(name) {
            let mut descriptor = lock(&entry.descriptor);
            descriptor.is_available = false;
            descriptor.last_error = Some(error.into());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(descriptor: &Mutex<ProviderDescriptor>) -> std::sync::MutexGuard<'_, ProviderDescriptor> {
    descriptor.lock().expect("provider descriptor lock poisoned")
}
