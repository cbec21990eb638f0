//! Shared terminal output helpers.

use std::collections::BTreeMap;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use handson_infra::llm::pricing::format_cost;
use handson_types::llm::GenerationResult;

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate to `max` characters, appending `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// One-line summary: model, tokens, cost, latency.
pub fn result_footer(result: &GenerationResult) -> String {
    format!(
        "{} · {} tokens ({} in / {} out) · {} · {}ms",
        result.model,
        result.tokens_total,
        result.tokens_input,
        result.tokens_output,
        format_cost(result.cost_usd),
        result.latency_ms
    )
}

/// Print a single answer with its provider header and footer.
pub fn print_answer(result: &GenerationResult) {
    let header = if result.is_degraded() {
        style(format!("▸ {}", result.provider)).red().bold()
    } else {
        style(format!("▸ {}", result.provider)).cyan().bold()
    };
    println!();
    println!("  {header}");
    println!();
    for line in result.text().lines() {
        println!("  {line}");
    }
    println!();
    println!("  {}", style(result_footer(result)).dim());
}

/// Table of per-provider results, with merge scores when available.
pub fn results_table(
    results: &[GenerationResult],
    scores: Option<&BTreeMap<String, i64>>,
    selected: Option<&str>,
) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Tokens").fg(Color::White),
        Cell::new("Cost").fg(Color::White),
        Cell::new("Latency").fg(Color::White),
    ];
    if scores.is_some() {
        header.push(Cell::new("Score").fg(Color::White));
    }
    table.set_header(header);

    for result in results {
        let status = if result.is_degraded() {
            Cell::new(truncate(result.text(), 40)).fg(Color::Red)
        } else {
            Cell::new("ok").fg(Color::Green)
        };
        let name = if selected == Some(result.provider.as_str()) {
            Cell::new(format!("{} ★", result.provider)).fg(Color::Cyan)
        } else {
            Cell::new(&result.provider).fg(Color::White)
        };

        let mut row = vec![
            name,
            Cell::new(&result.model).fg(Color::DarkGrey),
            status,
            Cell::new(result.tokens_total).fg(Color::White),
            Cell::new(format_cost(result.cost_usd)).fg(Color::White),
            Cell::new(format!("{}ms", result.latency_ms)).fg(Color::DarkGrey),
        ];
        if let Some(scores) = scores {
            let score = scores
                .get(&result.provider)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            row.push(Cell::new(score).fg(Color::Yellow));
        }
        table.add_row(row);
    }

    table
}

/// Totals across a batch: (tokens, cost).
pub fn batch_totals(results: &[GenerationResult]) -> (u64, f64) {
    results.iter().fold((0, 0.0), |(tokens, cost), r| {
        (tokens + u64::from(r.tokens_total), cost + r.cost_usd)
    })
}
