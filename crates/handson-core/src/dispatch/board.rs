//! Board evaluation: one LLM judges a batch of responses.
//!
//! This module holds the pure parts (short-circuit, prompt construction,
//! reply parsing). The evaluator call itself goes through
//! [`super::engine::DispatchEngine::board_evaluation`].

use std::sync::LazyLock;

use handson_types::dispatch::BoardEvaluation;
use handson_types::llm::GenerationResult;
use regex::Regex;

static RECOMMENDATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#>_-]*recommendation[\s*_]*:[\s*_]*(.+?)[\s*_.]*$")
        .expect("recommendation pattern is valid")
});

static REASON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^[\s*#>_-]*reason[\s*_]*:[\s*_]*(.+)").expect("reason pattern is valid")
});

/// Responses eligible for judging.
pub fn usable_results(results: &[GenerationResult]) -> Vec<&GenerationResult> {
    results.iter().filter(|r| !r.is_degraded()).collect()
}

/// Trivial evaluation when there is nothing to compare.
///
/// Returns `None` when at least two usable responses exist and a real
/// evaluation is needed.
pub fn short_circuit(usable: &[&GenerationResult]) -> Option<BoardEvaluation> {
    match usable {
        [] => Some(BoardEvaluation {
            recommendation: None,
            reason: "No usable responses to evaluate".to_string(),
            raw_evaluation: String::new(),
            evaluator: None,
            error: None,
        }),
        [only] => Some(BoardEvaluation {
            recommendation: Some(only.provider.clone()),
            reason: format!("Only one usable response (from {})", only.provider),
            raw_evaluation: String::new(),
            evaluator: None,
            error: None,
        }),
        _ => None,
    }
}

/// Evaluation prompt embedding the request and every candidate.
pub fn build_evaluation_prompt(
    prompt: &str,
    system_prompt: Option<&str>,
    candidates: &[&GenerationResult],
) -> String {
    let mut out = String::from(
        "You are reviewing answers from several AI models to the same request.\n\n",
    );
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        out.push_str("INSTRUCTIONS GIVEN TO THE MODELS:\n");
        out.push_str(system.trim());
        out.push_str("\n\n");
    }
    out.push_str("ORIGINAL REQUEST:\n");
    out.push_str(prompt.trim());
    out.push_str("\n\n");

    for candidate in candidates {
        out.push_str(&format!("RESPONSE FROM {}:\n", candidate.provider));
        out.push_str(candidate.text().trim());
        out.push_str("\n\n");
    }

    let names: Vec<&str> = candidates.iter().map(|c| c.provider.as_str()).collect();
    out.push_str(
        "Compare the responses for correctness, completeness and clarity, then pick the best one.\n",
    );
    out.push_str(&format!("Valid choices: {}\n", names.join(", ")));
    out.push_str("Answer in exactly this format:\nRECOMMENDATION: <provider name>\nREASON: <short explanation>\n");
    out
}

/// Best-effort reading of the evaluator's reply.
///
/// An explicit `RECOMMENDATION:` line naming a candidate wins; otherwise a
/// single candidate mentioned anywhere in the text. Anything else is left
/// unresolved.
pub fn parse_evaluation(raw: &str, candidates: &[&str]) -> (Option<String>, String) {
    let recommendation = RECOMMENDATION_LINE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|value| match_candidate(value.as_str(), candidates))
        .or_else(|| unique_mention(raw, candidates));

    let reason = REASON_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| raw.trim().to_string());

    (recommendation, reason)
}

fn match_candidate(value: &str, candidates: &[&str]) -> Option<String> {
    let cleaned = value.trim_matches(|c: char| c.is_whitespace() || "*_`'\"<>[]().".contains(c));
    candidates
        .iter()
        .find(|name| name.eq_ignore_ascii_case(cleaned))
        .map(|name| name.to_string())
        .or_else(|| unique_mention(value, candidates))
}

fn unique_mention(text: &str, candidates: &[&str]) -> Option<String> {
    let mentioned: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|name| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
                .map(|re| re.is_match(text))
                .unwrap_or(false)
        })
        .collect();

    match mentioned.as_slice() {
        [one] => Some(one.to_string()),
        _ => None,
    }
}
