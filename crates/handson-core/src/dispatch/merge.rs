//! Heuristic response selection.
//!
//! Scores each non-degraded response that carries text on length, code
//! content, structure, cost and latency, then returns the top one. Pure and
//! deterministic.

use std::collections::BTreeMap;

use handson_types::dispatch::{MergeMethod, MergeResult};
use handson_types::llm::GenerationResult;

const CODE_MARKERS: [&str; 4] = ["```", "def ", "function ", "class "];
const LIST_MARKERS: [&str; 3] = ["- ", "* ", "1."];

/// Pick the best response from a batch.
pub fn intelligent_merge(results: &[GenerationResult]) -> MergeResult {
    match results {
        [] => {
            return MergeResult {
                merged_content: None,
                method: MergeMethod::Empty,
                selected_provider: None,
                scores: None,
            };
        }
        [only] => {
            return MergeResult {
                merged_content: only.content.clone(),
                method: MergeMethod::Single,
                selected_provider: Some(only.provider.clone()),
                scores: None,
            };
        }
        _ => {}
    }

    let mut candidates: Vec<(&GenerationResult, i64)> = results
        .iter()
        .filter(|r| r.content.is_some() && !r.is_degraded())
        .map(|r| (r, score_response(r)))
        .collect();

    if candidates.is_empty() {
        let first = &results[0];
        return MergeResult {
            merged_content: first.content.clone(),
            method: MergeMethod::Fallback,
            selected_provider: Some(first.provider.clone()),
            scores: None,
        };
    }

    // Stable sort: ties keep input order.
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let scores: BTreeMap<String, i64> = candidates
        .iter()
        .map(|(r, score)| (r.provider.clone(), *score))
        .collect();
    let (best, best_score) = candidates[0];

    tracing::debug!(
        provider = %best.provider,
        score = best_score,
        candidates = candidates.len(),
        "Merge selected response"
    );

    MergeResult {
        merged_content: best.content.clone(),
        method: MergeMethod::AutoSelect,
        selected_provider: Some(best.provider.clone()),
        scores: Some(scores),
    }
}

/// Integer quality score for one response.
pub fn score_response(result: &GenerationResult) -> i64 {
    let content = result.text();
    let len = content.chars().count();
    let mut score: i64 = 0;

    if len > 100 && len < 10_000 {
        score += 10;
    } else if len >= 10_000 {
        score += 5;
    }

    if CODE_MARKERS.iter().any(|m| content.contains(m)) {
        score += 15;
    }
    if content.contains("\n\n") {
        score += 5;
    }
    if LIST_MARKERS.iter().any(|m| content.contains(m)) {
        score += 5;
    }

    let cost_penalty = (result.cost_usd * 100.0).floor() as i64;
    score += (10 - cost_penalty).max(0);

    let latency_penalty = (result.latency_ms / 1000) as i64;
    score += (10 - latency_penalty).max(0);

    score
}
