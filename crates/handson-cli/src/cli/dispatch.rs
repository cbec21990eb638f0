//! Dispatch commands: ask, parallel, merge, board.

use anyhow::Result;
use console::style;

use handson_core::dispatch::DispatchRequest;
use handson_infra::llm::pricing::format_cost;
use handson_types::dispatch::CombineMode;

use super::PromptArgs;
use super::render::{batch_totals, print_answer, print_json, results_table, truncate};
use crate::state::AppState;

/// Overrides accepted by `handson ask`.
pub struct AskOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Send one prompt to one provider.
pub async fn ask(state: &AppState, args: PromptArgs, options: AskOptions, json: bool) -> Result<()> {
    let mut request = DispatchRequest::new(args.prompt);
    request.system = args.system;
    request.provider = options.provider;
    request.model = options.model;
    request.max_tokens = options.max_tokens;
    request.temperature = options.temperature;

    let result = state.engine.process_request(request).await?;

    if json {
        return print_json(&result);
    }
    print_answer(&result);
    println!();
    Ok(())
}

/// Fan out and print every answer.
pub async fn parallel(state: &AppState, args: PromptArgs, json: bool) -> Result<()> {
    let results = state
        .engine
        .process_parallel(args.prompt, args.system.as_deref())
        .await?;

    if json {
        return print_json(&results);
    }

    for result in &results {
        print_answer(result);
    }
    println!();
    println!("{}", results_table(&results, None, None));
    print_totals(&results);
    Ok(())
}

/// Fan out, merge, print the winner and the score table.
pub async fn merge(state: &AppState, args: PromptArgs, json: bool) -> Result<()> {
    let outcome = state
        .engine
        .process(&args.prompt, args.system.as_deref(), CombineMode::Merge)
        .await?;

    if json {
        return print_json(&outcome);
    }

    let merged = outcome.merge.as_ref();
    println!();
    println!(
        "  {} {} ({})",
        style("Merged answer").bold(),
        outcome
            .provider
            .as_deref()
            .map(|p| style(p).cyan().to_string())
            .unwrap_or_else(|| style("none").dim().to_string()),
        style(&outcome.method).dim()
    );
    println!();
    match outcome.content.as_deref() {
        Some(content) => {
            for line in content.lines() {
                println!("  {line}");
            }
        }
        None => println!("  {}", style("No usable response.").yellow()),
    }
    println!();
    println!(
        "{}",
        results_table(
            &outcome.results,
            merged.and_then(|m| m.scores.as_ref()),
            outcome.provider.as_deref(),
        )
    );
    print_totals(&outcome.results);
    Ok(())
}

/// Fan out, let the evaluator choose, print the verdict.
pub async fn board(state: &AppState, args: PromptArgs, json: bool) -> Result<()> {
    let outcome = state
        .engine
        .process(&args.prompt, args.system.as_deref(), CombineMode::Board)
        .await?;

    if json {
        return print_json(&outcome);
    }

    println!();
    if let Some(ref evaluation) = outcome.board {
        let verdict = match evaluation.recommendation.as_deref() {
            Some(name) => style(name).green().bold().to_string(),
            None => style("no decision").yellow().to_string(),
        };
        println!(
            "  {} {}  {}",
            style("Board verdict:").bold(),
            verdict,
            style(format!(
                "evaluator: {}",
                evaluation.evaluator.as_deref().unwrap_or("-")
            ))
            .dim()
        );
        println!("  {} {}", style("Reason:").dim(), truncate(&evaluation.reason, 200));
        if let Some(ref error) = evaluation.error {
            println!("  {} {}", style("Evaluator error:").red(), error);
        }
    }

    println!();
    println!(
        "  {} {} ({})",
        style("Answer from").bold(),
        style(outcome.provider.as_deref().unwrap_or("none")).cyan(),
        style(&outcome.method).dim()
    );
    println!();
    for line in outcome.content.as_deref().unwrap_or("").lines() {
        println!("  {line}");
    }
    println!();
    println!(
        "{}",
        results_table(&outcome.results, None, outcome.provider.as_deref())
    );
    print_totals(&outcome.results);
    Ok(())
}

fn print_totals(results: &[handson_types::llm::GenerationResult]) {
    let (tokens, cost) = batch_totals(results);
    let failed = results.iter().filter(|r| r.is_degraded()).count();
    println!();
    println!(
        "  {} response{} · {} tokens · {}{}",
        style(results.len()).bold(),
        if results.len() == 1 { "" } else { "s" },
        tokens,
        format_cost(cost),
        if failed > 0 {
            format!(" · {}", style(format!("{failed} failed")).red())
        } else {
            String::new()
        }
    );
    println!();
}
