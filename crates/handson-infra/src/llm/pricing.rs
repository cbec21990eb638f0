//! Cost estimation for LLM providers.
//!
//! A built-in per-million-token table for the models the dispatch engine
//! ships with, user overrides from `handson.toml`, and a conservative
//! fallback for anything unknown.

use handson_types::config::ProviderPricing;

struct PricingEntry {
    provider: &'static str,
    model_pattern: &'static str,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
}

/// Fallback pricing when no model match is found.
const FALLBACK_INPUT_COST: f64 = 5.0;
const FALLBACK_OUTPUT_COST: f64 = 15.0;

/// Longer patterns come first so `gpt-4o-mini` wins over `gpt-4o`.
const DEFAULT_PRICING: &[PricingEntry] = &[
    PricingEntry {
        provider: "anthropic",
        model_pattern: "claude-sonnet-4",
        input_cost_per_million: 3.0,
        output_cost_per_million: 15.0,
    },
    PricingEntry {
        provider: "anthropic",
        model_pattern: "claude-opus-4",
        input_cost_per_million: 15.0,
        output_cost_per_million: 75.0,
    },
    PricingEntry {
        provider: "anthropic",
        model_pattern: "claude-3-5-haiku",
        input_cost_per_million: 0.80,
        output_cost_per_million: 4.0,
    },
    PricingEntry {
        provider: "openai",
        model_pattern: "gpt-4o-mini",
        input_cost_per_million: 0.15,
        output_cost_per_million: 0.60,
    },
    PricingEntry {
        provider: "openai",
        model_pattern: "gpt-4o",
        input_cost_per_million: 2.50,
        output_cost_per_million: 10.0,
    },
    PricingEntry {
        provider: "openai",
        model_pattern: "gpt-4.1-mini",
        input_cost_per_million: 0.40,
        output_cost_per_million: 1.60,
    },
    PricingEntry {
        provider: "gemini",
        model_pattern: "gemini-2.5-flash",
        input_cost_per_million: 0.30,
        output_cost_per_million: 2.50,
    },
    PricingEntry {
        provider: "gemini",
        model_pattern: "gemini-2.5-pro",
        input_cost_per_million: 1.25,
        output_cost_per_million: 10.0,
    },
];

/// Prefix match: `"claude-sonnet-4"` matches `"claude-sonnet-4-20250514"`.
fn matches_pattern(model: &str, pattern: &str) -> bool {
    model.starts_with(pattern)
}

/// Estimate the cost of one call in USD.
///
/// Lookup order:
/// 1. User overrides for this provider name
/// 2. Built-in table for this provider name
/// 3. Built-in table by model alone (custom provider names serving known models)
/// 4. Fallback ($5.00 / $15.00 per million tokens)
pub fn estimate_cost(
    input_tokens: u32,
    output_tokens: u32,
    model: &str,
    provider: &str,
    user_pricing: &[ProviderPricing],
) -> f64 {
    if let Some(pricing) = user_pricing
        .iter()
        .find(|p| p.provider_name == provider && matches_pattern(model, &p.model_pattern))
    {
        return compute_cost(
            input_tokens,
            output_tokens,
            pricing.input_cost_per_million,
            pricing.output_cost_per_million,
        );
    }

    let entry = DEFAULT_PRICING
        .iter()
        .find(|e| e.provider == provider && matches_pattern(model, e.model_pattern))
        .or_else(|| {
            DEFAULT_PRICING
                .iter()
                .find(|e| matches_pattern(model, e.model_pattern))
        });

    match entry {
        Some(entry) => compute_cost(
            input_tokens,
            output_tokens,
            entry.input_cost_per_million,
            entry.output_cost_per_million,
        ),
        None => compute_cost(input_tokens, output_tokens, FALLBACK_INPUT_COST, FALLBACK_OUTPUT_COST),
    }
}

fn compute_cost(
    input_tokens: u32,
    output_tokens: u32,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
) -> f64 {
    let input_cost = (input_tokens as f64 / 1_000_000.0) * input_cost_per_million;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * output_cost_per_million;
    input_cost + output_cost
}

/// Format a cost estimate for display.
///
/// Always prefixed with `~`; three decimals below $0.01, two above.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost_known_model() {
        let cost = estimate_cost(1_000_000, 100_000, "claude-sonnet-4-20250514", "anthropic", &[]);
        assert!((cost - 4.50).abs() < 0.001, "Expected ~$4.50, got ${cost}");
    }

    #[test]
    fn estimate_cost_user_override_takes_priority() {
        let user_pricing = vec![ProviderPricing {
            provider_name: "openai".to_string(),
            model_pattern: "gpt-4o".to_string(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
        }];
        let cost = estimate_cost(1_000_000, 100_000, "gpt-4o-2024-08-06", "openai", &user_pricing);
        assert!((cost - 1.50).abs() < 0.001, "Expected ~$1.50, got ${cost}");
    }

    #[test]
    fn estimate_cost_mini_matches_before_regular() {
        let cost = estimate_cost(1_000_000, 1_000_000, "gpt-4o-mini", "openai", &[]);
        assert!((cost - 0.75).abs() < 0.001, "Expected ~$0.75, got ${cost}");
    }

    #[test]
    fn estimate_cost_custom_provider_name_uses_model_match() {
        let cost = estimate_cost(1_000_000, 0, "gemini-2.5-flash", "my-gemini", &[]);
        assert!((cost - 0.30).abs() < 0.001, "Expected ~$0.30, got ${cost}");
    }

    #[test]
    fn estimate_cost_unknown_model_uses_fallback() {
        let cost = estimate_cost(1_000_000, 100_000, "some-unknown-model", "local", &[]);
        assert!((cost - 6.50).abs() < 0.001, "Expected ~$6.50, got ${cost}");
    }

    #[test]
    fn format_cost_precision() {
        assert_eq!(format_cost(0.001), "~$0.001");
        assert_eq!(format_cost(0.0), "~$0.000");
        assert_eq!(format_cost(0.12), "~$0.12");
        assert_eq!(format_cost(4.50), "~$4.50");
    }
}
