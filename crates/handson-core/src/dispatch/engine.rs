//! Multi-model dispatch engine.
//!
//! `DispatchEngine` selects providers, gates calls through the usage
//! limiter, runs single or fan-out requests, and combines batched answers
//! through the merger or the board evaluator. Every provider call runs
//! inside an OTel GenAI span and is bounded by the configured timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{Instrument, debug, info_span, warn};

use handson_types::config::DispatchConfig;
use handson_types::dispatch::{
    BoardEvaluation, CombineMode, DispatchError, DispatchOutcome, EngineStatus, MergeResult,
};
use handson_types::llm::{GenerationRequest, GenerationResult, LlmError, Message, ProviderDescriptor};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::registry::ProviderRegistry;

use super::board;
use super::merge;
use super::rotation::RotationSelector;
use super::usage::{UsageLimiter, UsageLimits};

const EVALUATOR_SYSTEM_PROMPT: &str =
    "You are an impartial reviewer. Judge the answers strictly on their merits.";

/// What the caller wants answered.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchInput {
    /// A raw prompt, sent as a single user message.
    Prompt(String),
    /// A full conversation history.
    Messages(Vec<Message>),
}

impl DispatchInput {
    fn into_messages(self) -> Result<Vec<Message>, DispatchError> {
        match self {
            DispatchInput::Prompt(prompt) if prompt.trim().is_empty() => {
                Err(DispatchError::InvalidArgument("prompt is empty".to_string()))
            }
            DispatchInput::Prompt(prompt) => Ok(vec![Message::user(prompt)]),
            DispatchInput::Messages(messages) if messages.is_empty() => Err(
                DispatchError::InvalidArgument("message list is empty".to_string()),
            ),
            DispatchInput::Messages(messages) => Ok(messages),
        }
    }
}

impl From<&str> for DispatchInput {
    fn from(prompt: &str) -> Self {
        DispatchInput::Prompt(prompt.to_string())
    }
}

impl From<String> for DispatchInput {
    fn from(prompt: String) -> Self {
        DispatchInput::Prompt(prompt)
    }
}

impl From<Vec<Message>> for DispatchInput {
    fn from(messages: Vec<Message>) -> Self {
        DispatchInput::Messages(messages)
    }
}

/// Single-dispatch request with every optional knob.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub input: DispatchInput,
    pub system: Option<String>,
    /// Explicit provider name; normal selection when unset.
    pub provider: Option<String>,
    /// Model override; the provider's configured model when unset.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl DispatchRequest {
    pub fn new(input: impl Into<DispatchInput>) -> Self {
        Self {
            input: input.into(),
            system: None,
            provider: None,
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Orchestrates provider selection, usage gating and response combination.
///
/// The usage limiter and rotation selector are injected so several engines
/// can coexist in one process, each with its own counters.
pub struct DispatchEngine {
    config: DispatchConfig,
    registry: ProviderRegistry,
    limiter: Arc<UsageLimiter>,
    rotation: Arc<RotationSelector>,
}

impl DispatchEngine {
    pub fn new(
        config: DispatchConfig,
        registry: ProviderRegistry,
        limiter: Arc<UsageLimiter>,
        rotation: Arc<RotationSelector>,
    ) -> Self {
        Self {
            config,
            registry,
            limiter,
            rotation,
        }
    }

    /// Build fresh limiter and rotation state for `registry`.
    ///
    /// The rotation covers the providers available right now and does not
    /// change afterwards.
    pub fn from_registry(config: DispatchConfig, registry: ProviderRegistry) -> Self {
        let limiter = Arc::new(UsageLimiter::new(UsageLimits::from(&config)));
        let rotation = Arc::new(RotationSelector::new(registry.available_names()));
        Self::new(config, registry, limiter, rotation)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &UsageLimiter {
        &self.limiter
    }

    pub fn rotation(&self) -> &RotationSelector {
        &self.rotation
    }

    /// Send one request to one provider.
    pub async fn process_single(
        &self,
        input: impl Into<DispatchInput>,
        system_prompt: Option<&str>,
        provider: Option<&str>,
    ) -> Result<GenerationResult, DispatchError> {
        let mut request = DispatchRequest::new(input);
        request.system = system_prompt.map(str::to_string);
        request.provider = provider.map(str::to_string);
        self.process_request(request).await
    }

    /// Send one request to one provider, with model and sampling overrides.
    pub async fn process_request(
        &self,
        request: DispatchRequest,
    ) -> Result<GenerationResult, DispatchError> {
        let DispatchRequest {
            input,
            system,
            provider,
            model,
            max_tokens,
            temperature,
        } = request;

        let messages = input.into_messages()?;
        self.check_limits()?;

        let (name, provider) = self.select_provider(provider.as_deref())?;
        let request = self.generation_request(messages, system, model, max_tokens, temperature);

        debug!(provider = %name, model = %provider.model(), "Dispatching single request");

        match self.call_provider(&name, provider, &request).await {
            Ok(result) => {
                self.limiter
                    .record_usage(u64::from(result.tokens_total), result.cost_usd);
                Ok(result)
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "Provider call failed");
                self.registry.record_error(&name, e.to_string());
                Err(DispatchError::ProviderCall {
                    provider: name,
                    source: e,
                })
            }
        }
    }

    /// Send the same request to every available provider.
    ///
    /// A failing provider contributes a degraded result instead of failing
    /// the batch. Result order is not meaningful; read `provider`.
    pub async fn process_parallel(
        &self,
        input: impl Into<DispatchInput>,
        system_prompt: Option<&str>,
    ) -> Result<Vec<GenerationResult>, DispatchError> {
        let messages = input.into().into_messages()?;
        self.check_limits()?;

        let targets: Vec<(String, &BoxLlmProvider)> = self
            .registry
            .available_names()
            .into_iter()
            .filter_map(|name| self.registry.get(&name).map(|p| (name, p)))
            .collect();

        if targets.is_empty() {
            return Err(DispatchError::NoProviderAvailable);
        }

        let request = self.generation_request(
            messages,
            system_prompt.map(str::to_string),
            None,
            None,
            None,
        );

        debug!(
            providers = targets.len(),
            concurrent = self.config.parallel_execution,
            "Dispatching fan-out request"
        );

        let results = if self.config.parallel_execution {
            join_all(
                targets
                    .iter()
                    .map(|(name, provider)| self.fan_out_call(name, provider, &request)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(targets.len());
            for (name, provider) in &targets {
                results.push(self.fan_out_call(name, provider, &request).await);
            }
            results
        };

        Ok(results)
    }

    /// Heuristic pick of the best result.
    pub fn intelligent_merge(&self, results: &[GenerationResult]) -> MergeResult {
        merge::intelligent_merge(results)
    }

    /// Ask the evaluator provider to pick the best result.
    ///
    /// Never fails: evaluator errors land in `BoardEvaluation::error`.
    pub async fn board_evaluation(
        &self,
        prompt: &str,
        results: &[GenerationResult],
        system_prompt: Option<&str>,
    ) -> BoardEvaluation {
        let usable = board::usable_results(results);
        if let Some(evaluation) = board::short_circuit(&usable) {
            debug!(usable = usable.len(), "Board evaluation short-circuited");
            return evaluation;
        }

        let candidates: Vec<&str> = usable.iter().map(|r| r.provider.as_str()).collect();
        let mut request = DispatchRequest::new(board::build_evaluation_prompt(
            prompt,
            system_prompt,
            &usable,
        ))
        .with_system(EVALUATOR_SYSTEM_PROMPT);
        request.provider = self.config.board_evaluator_provider.clone();
        request.model = self.config.board_evaluator_model.clone();

        match self.process_request(request).await {
            Ok(result) => {
                let raw = result.text().to_string();
                let (recommendation, reason) = board::parse_evaluation(&raw, &candidates);
                match &recommendation {
                    Some(name) => debug!(evaluator = %result.provider, recommendation = %name, "Board evaluation resolved"),
                    None => warn!(evaluator = %result.provider, "Board evaluation did not name a candidate"),
                }
                BoardEvaluation {
                    recommendation,
                    reason,
                    raw_evaluation: raw,
                    evaluator: Some(result.provider),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Board evaluation failed");
                BoardEvaluation {
                    recommendation: None,
                    reason: "Board evaluation failed".to_string(),
                    raw_evaluation: String::new(),
                    evaluator: self.config.board_evaluator_provider.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Answer `prompt` and describe how the answer was produced.
    pub async fn process(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        mode: CombineMode,
    ) -> Result<DispatchOutcome, DispatchError> {
        match mode {
            CombineMode::Single => {
                let result = self.process_single(prompt, system_prompt, None).await?;
                Ok(DispatchOutcome {
                    content: result.content.clone(),
                    provider: Some(result.provider.clone()),
                    mode,
                    method: "single".to_string(),
                    results: vec![result],
                    merge: None,
                    board: None,
                })
            }
            CombineMode::Merge => {
                let results = self.process_parallel(prompt, system_prompt).await?;
                let merged = merge::intelligent_merge(&results);
                Ok(DispatchOutcome {
                    content: merged.merged_content.clone(),
                    provider: merged.selected_provider.clone(),
                    mode,
                    method: merged.method.to_string(),
                    results,
                    merge: Some(merged),
                    board: None,
                })
            }
            CombineMode::Board => {
                let results = self.process_parallel(prompt, system_prompt).await?;
                let evaluation = self.board_evaluation(prompt, &results, system_prompt).await;
                let merged = merge::intelligent_merge(&results);

                let chosen = evaluation
                    .recommendation
                    .as_deref()
                    .and_then(|name| results.iter().find(|r| r.provider == name));

                let (content, provider, method) = match chosen {
                    Some(r) => (r.content.clone(), Some(r.provider.clone()), "board".to_string()),
                    None => (
                        merged.merged_content.clone(),
                        merged.selected_provider.clone(),
                        merged.method.to_string(),
                    ),
                };

                Ok(DispatchOutcome {
                    content,
                    provider,
                    mode,
                    method,
                    results,
                    merge: Some(merged),
                    board: Some(evaluation),
                })
            }
        }
    }

    /// Check every available provider's credentials.
    ///
    /// Providers whose key is rejected are marked unavailable. The rotation
    /// order is left untouched.
    pub async fn validate_providers(&self) -> Vec<ProviderDescriptor> {
        let checks = self
            .registry
            .available_names()
            .into_iter()
            .filter_map(|name| self.registry.get(&name).map(|p| (name, p)))
            .map(|(name, provider)| async move {
                let span = info_span!("gen_ai.validate_key", gen_ai.system = %name);
                let outcome = self
                    .bounded(provider.validate_key())
                    .instrument(span)
                    .await;
                (name, outcome)
            });

        for (name, outcome) in join_all(checks).await {
            match outcome {
                Ok(true) => debug!(provider = %name, "API key accepted"),
                Ok(false) => {
                    warn!(provider = %name, "API key rejected, marking provider unavailable");
                    self.registry
                        .mark_unavailable(&name, "API key rejected by provider");
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Key validation failed, marking provider unavailable");
                    self.registry.mark_unavailable(&name, e.to_string());
                }
            }
        }

        self.registry.descriptors()
    }

    pub fn get_available_providers(&self) -> Vec<String> {
        self.registry.available_names()
    }

    pub fn get_status(&self) -> EngineStatus {
        EngineStatus {
            usage: self.limiter.get_status(),
            rotation_order: self.rotation.get_order(),
            rotations: self.rotation.rotations(),
            use_round_robin: self.config.use_round_robin,
            parallel_execution: self.config.parallel_execution,
            providers: self.registry.descriptors(),
        }
    }

    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.registry.descriptors()
    }

    fn check_limits(&self) -> Result<(), DispatchError> {
        self.limiter.can_proceed().map_err(|violation| {
            warn!(
                ceiling = %violation.ceiling,
                reason = %violation.message,
                "Usage limit reached, request rejected"
            );
            DispatchError::LimiterExceeded(violation)
        })
    }

    /// Resolve the provider for a single-shot call.
    ///
    /// Explicit name if registered, then round-robin or first available,
    /// then any available provider.
    fn select_provider(
        &self,
        requested: Option<&str>,
    ) -> Result<(String, &BoxLlmProvider), DispatchError> {
        if let Some(name) = requested {
            if self.registry.contains(name) {
                return match self.registry.get(name) {
                    Some(provider) if self.registry.is_available(name) => {
                        Ok((name.to_string(), provider))
                    }
                    _ => {
                        let message = self
                            .registry
                            .descriptor(name)
                            .and_then(|d| d.last_error)
                            .unwrap_or_else(|| "provider is unavailable".to_string());
                        Err(DispatchError::Configuration {
                            provider: name.to_string(),
                            message,
                        })
                    }
                };
            }
            warn!(provider = %name, "Requested provider is not registered, using normal selection");
        }

        let candidate = if self.config.use_round_robin {
            self.rotation.get_next()
        } else {
            self.registry.available_names().into_iter().next()
        };

        if let Some(name) = candidate {
            if let Some(provider) = self.registry.get(&name) {
                if !self.registry.is_available(&name) {
                    warn!(
                        provider = %name,
                        "Rotation selected a provider that is no longer available"
                    );
                }
                return Ok((name, provider));
            }
        }

        self.registry
            .available_names()
            .into_iter()
            .find_map(|name| self.registry.get(&name).map(|p| (name, p)))
            .ok_or(DispatchError::NoProviderAvailable)
    }

    fn generation_request(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> GenerationRequest {
        GenerationRequest {
            model: model.unwrap_or_default(),
            messages,
            system,
            max_tokens: max_tokens.unwrap_or(self.config.default_max_tokens),
            temperature: temperature.or(self.config.default_temperature),
        }
    }

    async fn call_provider(
        &self,
        name: &str,
        provider: &BoxLlmProvider,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, LlmError> {
        let model = if request.model.is_empty() {
            provider.model()
        } else {
            request.model.as_str()
        };

        let span = info_span!(
            "gen_ai.generate",
            gen_ai.system = name,
            gen_ai.request.model = %model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        self.bounded(provider.generate(request)).instrument(span).await
    }

    /// One fan-out leg: failures become degraded results.
    async fn fan_out_call(
        &self,
        name: &str,
        provider: &BoxLlmProvider,
        request: &GenerationRequest,
    ) -> GenerationResult {
        let started = Instant::now();
        match self.call_provider(name, provider, request).await {
            Ok(result) => {
                self.limiter
                    .record_usage(u64::from(result.tokens_total), result.cost_usd);
                result
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "Provider failed in fan-out, result degraded");
                self.registry.record_error(name, e.to_string());
                GenerationResult::degraded(
                    name,
                    provider.model(),
                    &e.to_string(),
                    started.elapsed().as_millis() as u64,
                )
            }
        }
    }

    /// Apply the per-call timeout. Zero disables it.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LlmError>>,
    ) -> Result<T, LlmError> {
        let secs = self.config.request_timeout_secs;
        if secs == 0 {
            return call.await;
        }
        match tokio::time::timeout(Duration::from_secs(secs), call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LlmError::Timeout {
                after_ms: secs.saturating_mul(1_000),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use chrono::NaiveDate;
    use handson_types::dispatch::{MergeMethod, UsageCeiling};

    use crate::dispatch::usage::UsageCounters;
    use crate::llm::mock::MockProvider;
    use crate::llm::provider::LlmProvider;

    fn config() -> DispatchConfig {
        DispatchConfig {
            board_evaluator_provider: None,
            ..DispatchConfig::default()
        }
    }

    fn registry_of(providers: Vec<MockProvider>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            let name = LlmProvider::name(&provider).to_string();
            registry.register(name, BoxLlmProvider::new(provider));
        }
        registry
    }

    fn engine(providers: Vec<MockProvider>, config: DispatchConfig) -> DispatchEngine {
        DispatchEngine::from_registry(config, registry_of(providers))
    }

    fn fenced_code(lines: usize) -> String {
        let mut code = String::from("```python\ndef build():\n");
        for i in 0..lines {
            code.push_str(&format!("    step_{i} = run({i})\n"));
        }
        code.push_str("```");
        code
    }

    #[tokio::test]
    async fn test_round_robin_cycles_providers() {
        let engine = engine(
            vec![MockProvider::echo("a"), MockProvider::echo("b"), MockProvider::echo("c")],
            config(),
        );

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(engine.process_single("hi", None, None).await.unwrap().provider);
        }
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c"]);
        assert_eq!(engine.get_status().rotations, 6);
    }

    #[tokio::test]
    async fn test_first_available_without_round_robin() {
        let config = DispatchConfig {
            use_round_robin: false,
            ..config()
        };
        let engine = engine(vec![MockProvider::echo("a"), MockProvider::echo("b")], config);
        for _ in 0..3 {
            let result = engine.process_single("hi", None, None).await.unwrap();
            assert_eq!(result.provider, "a");
        }
        assert_eq!(engine.rotation().rotations(), 0);
    }

    #[tokio::test]
    async fn test_explicit_provider_is_used() {
        let engine = engine(vec![MockProvider::echo("a"), MockProvider::echo("b")], config());
        let result = engine.process_single("hello", Some("be brief"), Some("b")).await.unwrap();
        assert_eq!(result.provider, "b");
        assert_eq!(result.text(), "[b] hello");
        assert_eq!(engine.rotation().rotations(), 0);
    }

    #[tokio::test]
    async fn test_explicit_unloaded_provider_fails_fast() {
        let mut registry = registry_of(vec![MockProvider::echo("a")]);
        registry.register_unavailable("b", "b-1", "not configured: set B_API_KEY");
        let engine = DispatchEngine::from_registry(config(), registry);

        let err = engine.process_single("hi", None, Some("b")).await.unwrap_err();
        match err {
            DispatchError::Configuration { provider, message } => {
                assert_eq!(provider, "b");
                assert!(message.contains("B_API_KEY"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
        assert_eq!(engine.rotation().get_order(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unregistered_provider_falls_back_to_selection() {
        let engine = engine(vec![MockProvider::echo("a")], config());
        let result = engine.process_single("hi", None, Some("nope")).await.unwrap();
        assert_eq!(result.provider, "a");
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_any_call() {
        let mock = MockProvider::echo("a");
        let calls = mock.call_counter();
        let engine = engine(vec![mock], config());

        let err = engine.process_single("   ", None, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument(_)));

        let err = engine.process_single(Vec::<Message>::new(), None, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument(_)));

        let err = engine.process_parallel("", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument(_)));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_message_history_is_forwarded() {
        let mock = MockProvider::echo("a");
        let log = mock.request_log();
        let engine = engine(vec![mock], config());

        let history = vec![
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
        ];
        let result = engine.process_single(history, None, None).await.unwrap();
        assert_eq!(result.text(), "[a] second");
        assert_eq!(log.lock().unwrap()[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_request_ceiling_blocks_second_call() {
        let mock = MockProvider::responding("a", "ok");
        let calls = mock.call_counter();
        let config = DispatchConfig {
            max_requests_per_day: 1,
            ..config()
        };
        let engine = engine(vec![mock], config);

        engine.process_single("one", None, None).await.unwrap();
        assert_eq!(engine.get_status().usage.daily_requests, 1);

        let err = engine.process_single("two", None, None).await.unwrap_err();
        match err {
            DispatchError::LimiterExceeded(violation) => {
                assert!(violation.message.contains("requests"));
            }
            other => panic!("expected limiter error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_gate_reserves_nothing_for_concurrent_calls() {
        let config = DispatchConfig {
            max_requests_per_day: 1,
            ..config()
        };
        let engine = engine(
            vec![
                MockProvider::echo("a").with_delay(Duration::from_millis(100)),
                MockProvider::echo("b").with_delay(Duration::from_millis(100)),
            ],
            config,
        );

        // Both calls pass the gate before either records usage.
        let (x, y) = tokio::join!(
            engine.process_single("x", None, None),
            engine.process_single("y", None, None),
        );
        assert!(x.is_ok());
        assert!(y.is_ok());
        assert_eq!(engine.get_status().usage.daily_requests, 2);

        match engine.process_single("z", None, None).await.unwrap_err() {
            DispatchError::LimiterExceeded(violation) => {
                assert!(matches!(violation.ceiling, UsageCeiling::Requests));
                assert!(violation.message.contains("requests"));
            }
            other => panic!("expected limiter error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_injected_stale_counters_roll_over() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let limits = UsageLimits {
            max_requests_per_day: 3,
            max_tokens_per_day: 1_000,
            max_cost_per_day_usd: 1.0,
        };
        let stale = UsageCounters {
            daily_requests: 3,
            daily_tokens: 900,
            daily_cost_usd: 0.9,
            last_reset_date: yesterday,
        };
        let limiter = Arc::new(UsageLimiter::from_counters(limits, stale).with_clock(move || today));
        let registry = registry_of(vec![MockProvider::echo("a")]);
        let rotation = Arc::new(RotationSelector::new(registry.available_names()));
        let engine = DispatchEngine::new(config(), registry, Arc::clone(&limiter), rotation);

        engine.process_single("hi", None, None).await.unwrap();

        let counters = limiter.counters();
        assert_eq!(counters.daily_requests, 1);
        assert_eq!(counters.daily_tokens, 30);
        assert_eq!(counters.last_reset_date, today);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_and_records_error() {
        let engine = engine(
            vec![MockProvider::failing(
                "a",
                LlmError::Provider {
                    message: "connection refused".to_string(),
                },
            )],
            config(),
        );

        let err = engine.process_single("hi", None, None).await.unwrap_err();
        match &err {
            DispatchError::ProviderCall { provider, source } => {
                assert_eq!(provider, "a");
                assert!(matches!(source, LlmError::Provider { .. }));
            }
            other => panic!("expected provider call error, got {other:?}"),
        }

        let descriptor = engine.registry().descriptor("a").unwrap();
        assert!(descriptor.last_error.unwrap().contains("connection refused"));
        assert!(descriptor.is_available);
        assert_eq!(engine.get_status().usage.daily_requests, 0);
    }

    #[tokio::test]
    async fn test_no_provider_available() {
        let mut registry = ProviderRegistry::new();
        registry.register_unavailable("a", "a-1", "missing key");
        let engine = DispatchEngine::from_registry(config(), registry);

        let err = engine.process_single("hi", None, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoProviderAvailable));

        let err = engine.process_parallel("hi", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoProviderAvailable));
    }

    #[tokio::test]
    async fn test_request_overrides_reach_provider() {
        let mock = MockProvider::echo("a");
        let log = mock.request_log();
        let config = DispatchConfig {
            default_max_tokens: 256,
            default_temperature: Some(0.2),
            ..config()
        };
        let engine = engine(vec![mock], config);

        engine.process_single("defaults", None, None).await.unwrap();
        let result = engine
            .process_request(
                DispatchRequest::new("custom")
                    .with_system("terse")
                    .with_model("a-large")
                    .with_max_tokens(64)
                    .with_temperature(0.9),
            )
            .await
            .unwrap();
        assert_eq!(result.model, "a-large");

        let log = log.lock().unwrap();
        assert_eq!(log[0].max_tokens, 256);
        assert_eq!(log[0].temperature, Some(0.2));
        assert!(log[0].model.is_empty());
        assert_eq!(log[1].max_tokens, 64);
        assert_eq!(log[1].temperature, Some(0.9));
        assert_eq!(log[1].system.as_deref(), Some("terse"));
    }

    #[tokio::test]
    async fn test_parallel_isolates_degraded_results() {
        let engine = engine(
            vec![
                MockProvider::failing(
                    "x",
                    LlmError::Provider {
                        message: "adapter raised".to_string(),
                    },
                ),
                MockProvider::responding("y", "answer from y").with_cost(0.001),
                MockProvider::responding("z", "answer from z").with_cost(0.002),
            ],
            config(),
        );

        let results = engine.process_parallel("question", None).await.unwrap();
        assert_eq!(results.len(), 3);

        let x = results.iter().find(|r| r.provider == "x").unwrap();
        assert!(x.text().starts_with("ERROR:"));
        assert_eq!(x.tokens_total, 0);
        assert_eq!(x.cost_usd, 0.0);

        for name in ["y", "z"] {
            let r = results.iter().find(|r| r.provider == name).unwrap();
            assert_eq!(r.tokens_total, 30);
            assert!(r.cost_usd > 0.0);
        }

        let usage = engine.get_status().usage;
        assert_eq!(usage.daily_requests, 2);
        assert_eq!(usage.daily_tokens, 60);
        assert!(engine.registry().descriptor("x").unwrap().last_error.is_some());
    }

    #[tokio::test]
    async fn test_sequential_fan_out_has_same_semantics() {
        let config = DispatchConfig {
            parallel_execution: false,
            ..config()
        };
        let engine = engine(
            vec![
                MockProvider::responding("a", "one"),
                MockProvider::failing("b", LlmError::AuthenticationFailed),
            ],
            config,
        );

        let results = engine.process_parallel("q", None).await.unwrap();
        let providers: Vec<&str> = results.iter().map(|r| r.provider.as_str()).collect();
        assert_eq!(providers, vec!["a", "b"]);
        assert!(results[1].is_degraded());
        assert_eq!(engine.get_status().usage.daily_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_calls_run_concurrently() {
        let engine = engine(
            vec![
                MockProvider::echo("a").with_delay(Duration::from_millis(200)),
                MockProvider::echo("b").with_delay(Duration::from_millis(200)),
                MockProvider::echo("c").with_delay(Duration::from_millis(200)),
            ],
            config(),
        );

        let started = tokio::time::Instant::now();
        let results = engine.process_parallel("q", None).await.unwrap();
        assert_eq!(results.len(), 3);
        // Sequential calls would need 600ms of virtual time.
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let config = DispatchConfig {
            request_timeout_secs: 1,
            ..config()
        };
        let engine = engine(
            vec![MockProvider::echo("slow").with_delay(Duration::from_secs(5))],
            config,
        );

        let err = engine.process_single("hi", None, None).await.unwrap_err();
        match err {
            DispatchError::ProviderCall { source, .. } => {
                assert!(matches!(source, LlmError::Timeout { after_ms: 1_000 }));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let results = engine.process_parallel("hi", None).await.unwrap();
        assert!(results[0].is_degraded());
        assert!(results[0].text().contains("timed out"));
    }

    #[tokio::test]
    async fn test_board_short_circuit_makes_no_call() {
        let judge = MockProvider::responding("judge", "RECOMMENDATION: a");
        let judge_calls = judge.call_counter();
        let config = DispatchConfig {
            board_evaluator_provider: Some("judge".to_string()),
            ..config()
        };
        let engine = engine(vec![judge], config);

        let single = GenerationResult::new("a", "a-1", Some("only".into()), 1, 1, 0.0, 0);
        let evaluation = engine.board_evaluation("q", &[single], None).await;

        assert_eq!(evaluation.recommendation.as_deref(), Some("a"));
        assert_eq!(judge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.get_status().usage.daily_requests, 0);
    }

    #[tokio::test]
    async fn test_board_uses_configured_evaluator_and_model() {
        let judge = MockProvider::responding(
            "judge",
            "RECOMMENDATION: beta\nREASON: beta includes runnable code.",
        );
        let judge_log = judge.request_log();
        let other = MockProvider::echo("other");
        let other_calls = other.call_counter();
        let config = DispatchConfig {
            board_evaluator_provider: Some("judge".to_string()),
            board_evaluator_model: Some("judge-large".to_string()),
            ..config()
        };
        let engine = engine(vec![other, judge], config);

        let results = vec![
            GenerationResult::new("alpha", "m", Some("short".into()), 1, 1, 0.0, 0),
            GenerationResult::new("beta", "m", Some(fenced_code(3)), 1, 1, 0.0, 0),
        ];
        let evaluation = engine
            .board_evaluation("write a function", &results, Some("use python"))
            .await;

        assert_eq!(evaluation.recommendation.as_deref(), Some("beta"));
        assert_eq!(evaluation.reason, "beta includes runnable code.");
        assert_eq!(evaluation.evaluator.as_deref(), Some("judge"));
        assert!(evaluation.raw_evaluation.starts_with("RECOMMENDATION"));
        assert!(evaluation.error.is_none());

        let log = judge_log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].model, "judge-large");
        let prompt = &log[0].messages[0].content;
        assert!(prompt.contains("RESPONSE FROM alpha"));
        assert!(prompt.contains("RESPONSE FROM beta"));
        assert!(prompt.contains("use python"));
        assert_eq!(other_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_board_unresolved_keeps_raw_text() {
        let config = DispatchConfig {
            board_evaluator_provider: Some("judge".to_string()),
            ..config()
        };
        let engine = engine(
            vec![MockProvider::responding("judge", "Both are fine, honestly.")],
            config,
        );
        let results = vec![
            GenerationResult::new("alpha", "m", Some("x".into()), 1, 1, 0.0, 0),
            GenerationResult::new("beta", "m", Some("y".into()), 1, 1, 0.0, 0),
        ];
        let evaluation = engine.board_evaluation("q", &results, None).await;
        assert!(evaluation.recommendation.is_none());
        assert_eq!(evaluation.raw_evaluation, "Both are fine, honestly.");
    }

    #[tokio::test]
    async fn test_board_evaluator_failure_is_captured() {
        let config = DispatchConfig {
            board_evaluator_provider: Some("judge".to_string()),
            ..config()
        };
        let engine = engine(
            vec![MockProvider::failing("judge", LlmError::Overloaded("busy".into()))],
            config,
        );
        let results = vec![
            GenerationResult::new("alpha", "m", Some("x".into()), 1, 1, 0.0, 0),
            GenerationResult::new("beta", "m", Some("y".into()), 1, 1, 0.0, 0),
        ];
        let evaluation = engine.board_evaluation("q", &results, None).await;
        assert!(evaluation.recommendation.is_none());
        assert!(evaluation.error.unwrap().contains("busy"));
    }

    #[tokio::test]
    async fn test_board_limiter_rejection_is_captured() {
        let config = DispatchConfig {
            board_evaluator_provider: Some("judge".to_string()),
            max_requests_per_day: 0,
            ..config()
        };
        let engine = engine(vec![MockProvider::responding("judge", "RECOMMENDATION: alpha")], config);
        let results = vec![
            GenerationResult::new("alpha", "m", Some("x".into()), 1, 1, 0.0, 0),
            GenerationResult::new("beta", "m", Some("y".into()), 1, 1, 0.0, 0),
        ];
        let evaluation = engine.board_evaluation("q", &results, None).await;
        assert!(evaluation.recommendation.is_none());
        assert!(evaluation.error.unwrap().contains("requests"));
    }

    #[tokio::test]
    async fn test_alpha_beta_end_to_end() {
        let engine = engine(
            vec![
                MockProvider::responding("alpha", "short")
                    .with_cost(0.0001)
                    .with_latency_ms(100),
                MockProvider::responding("beta", fenced_code(40))
                    .with_cost(0.01)
                    .with_latency_ms(900),
            ],
            config(),
        );

        let results = engine.process_parallel("write a function", None).await.unwrap();
        assert_eq!(results.len(), 2);

        let merged = engine.intelligent_merge(&results);
        assert_eq!(merged.method, MergeMethod::AutoSelect);
        assert_eq!(merged.selected_provider.as_deref(), Some("beta"));
        let scores = merged.scores.unwrap();
        assert!(scores["beta"] > scores["alpha"]);
    }

    #[tokio::test]
    async fn test_process_modes() {
        let config = DispatchConfig {
            board_evaluator_provider: Some("alpha".to_string()),
            ..config()
        };
        let engine = engine(
            vec![
                MockProvider::responding("alpha", "RECOMMENDATION: beta\nREASON: code"),
                MockProvider::responding("beta", fenced_code(5)),
            ],
            config,
        );

        let single = engine.process("q", None, CombineMode::Single).await.unwrap();
        assert_eq!(single.method, "single");
        assert_eq!(single.results.len(), 1);

        let merged = engine.process("q", None, CombineMode::Merge).await.unwrap();
        assert_eq!(merged.provider.as_deref(), Some("beta"));
        assert_eq!(merged.method, "auto_select");
        assert!(merged.merge.is_some());

        let board = engine.process("q", None, CombineMode::Board).await.unwrap();
        assert_eq!(board.method, "board");
        assert_eq!(board.provider.as_deref(), Some("beta"));
        assert_eq!(board.content, Some(fenced_code(5)));
        assert!(board.board.unwrap().recommendation.is_some());
    }

    #[tokio::test]
    async fn test_board_mode_falls_back_to_merge() {
        let config = DispatchConfig {
            board_evaluator_provider: Some("alpha".to_string()),
            ..config()
        };
        let engine = engine(
            vec![
                MockProvider::responding("alpha", "no idea"),
                MockProvider::responding("beta", fenced_code(5)),
            ],
            config,
        );
        let outcome = engine.process("q", None, CombineMode::Board).await.unwrap();
        assert_eq!(outcome.method, "auto_select");
        assert_eq!(outcome.provider.as_deref(), Some("beta"));
        assert!(outcome.board.unwrap().recommendation.is_none());
    }

    #[tokio::test]
    async fn test_validate_providers_keeps_rotation_fixed() {
        let engine = engine(
            vec![MockProvider::echo("a"), MockProvider::echo("b").with_invalid_key()],
            config(),
        );

        let descriptors = engine.validate_providers().await;
        let b = descriptors.iter().find(|d| d.name == "b").unwrap();
        assert!(!b.is_available);
        assert_eq!(b.last_error.as_deref(), Some("API key rejected by provider"));
        assert_eq!(engine.get_available_providers(), vec!["a"]);
        assert_eq!(engine.rotation().get_order(), vec!["a", "b"]);

        // Rotation still reaches the stale provider.
        engine.process_single("hi", None, None).await.unwrap();
        let stale = engine.process_single("hi", None, None).await.unwrap();
        assert_eq!(stale.provider, "b");

        let err = engine.process_single("hi", None, Some("b")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let mut registry = registry_of(vec![MockProvider::echo("a")]);
        registry.register_unavailable("b", "b-1", "missing key");
        let engine = DispatchEngine::from_registry(config(), registry);

        engine.process_single("hi", None, None).await.unwrap();
        let status = engine.get_status();
        assert_eq!(status.usage.daily_requests, 1);
        assert_eq!(status.usage.max_requests_per_day, 1_000);
        assert_eq!(status.rotation_order, vec!["a"]);
        assert_eq!(status.rotations, 1);
        assert!(status.use_round_robin);
        assert_eq!(status.providers.len(), 2);
        assert_eq!(engine.providers()[1].last_error.as_deref(), Some("missing key"));
    }
}
