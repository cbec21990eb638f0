//! Engine status dashboard.

use anyhow::Result;
use console::style;

use handson_infra::llm::pricing::format_cost;

use crate::state::AppState;

/// Display usage counters against ceilings, rotation and provider counts.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let status = state.engine.get_status();

    if json {
        let value = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let usage = &status.usage;

    println!();
    println!(
        "  {} Hands On AI v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Usage today ──").dim());
    println!(
        "  Requests: {}",
        meter(usage.daily_requests as f64, usage.max_requests_per_day as f64, |v| {
            format!("{v:.0}")
        })
    );
    println!(
        "  Tokens:   {}",
        meter(usage.daily_tokens as f64, usage.max_tokens_per_day as f64, |v| {
            format_tokens(v as u64)
        })
    );
    println!(
        "  Cost:     {}",
        meter(usage.daily_cost_usd, usage.max_cost_per_day_usd, format_cost)
    );
    println!(
        "  Since:    {}",
        style(usage.last_reset_date).dim()
    );
    println!();

    let available = status.providers.iter().filter(|p| p.is_available).count();
    println!("  {}", style("── Providers ──").dim());
    println!(
        "  Loaded:    {}",
        style(status.providers.len()).bold()
    );
    println!(
        "  Available: {}",
        style(available).green()
    );
    println!();

    println!("  {}", style("── Dispatch ──").dim());
    println!(
        "  Round-robin: {}",
        on_off(status.use_round_robin)
    );
    println!(
        "  Parallel:    {}",
        on_off(status.parallel_execution)
    );
    if !status.rotation_order.is_empty() {
        println!(
            "  Next up:     {}",
            style(status.rotation_order.join(" → ")).cyan()
        );
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!(
        "  Data dir: {}",
        style(state.data_dir.display()).dim()
    );
    println!();

    Ok(())
}

fn meter(used: f64, max: f64, fmt: impl Fn(f64) -> String) -> String {
    let text = format!("{} / {}", fmt(used), fmt(max));
    if used >= max {
        style(text).red().to_string()
    } else if max > 0.0 && used / max >= 0.8 {
        style(text).yellow().to_string()
    } else {
        style(text).green().to_string()
    }
}

fn on_off(flag: bool) -> String {
    if flag {
        style("on").green().to_string()
    } else {
        style("off").dim().to_string()
    }
}

fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
