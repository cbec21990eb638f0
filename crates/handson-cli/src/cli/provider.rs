//! `handson providers`: configured providers and their availability.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use handson_types::llm::ProviderDescriptor;

use super::render::{print_json, truncate};
use crate::state::AppState;

/// List providers in registry order, optionally validating API keys first.
pub async fn providers(state: &AppState, validate: bool, json: bool) -> Result<()> {
    let descriptors = if validate {
        state.engine.validate_providers().await
    } else {
        state.engine.providers()
    };

    if json {
        return print_json(&descriptors);
    }

    if descriptors.is_empty() {
        println!();
        println!(
            "  {} No providers enabled. Set {} in handson.toml or {}.",
            style("i").blue().bold(),
            style("dispatch.enabled_providers").cyan(),
            style("HANDSON_ENABLED_PROVIDERS").cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("  {}", style("Providers").bold());
    println!();
    println!("{}", provider_table(state, &descriptors));

    let available = descriptors.iter().filter(|d| d.is_available).count();
    println!();
    println!(
        "  {} of {} provider{} available",
        style(available).bold(),
        descriptors.len(),
        if descriptors.len() == 1 { "" } else { "s" }
    );
    if !validate {
        println!(
            "  {}",
            style("Run with --validate to check API keys.").dim()
        );
    }
    println!();

    Ok(())
}

fn provider_table(state: &AppState, descriptors: &[ProviderDescriptor]) -> Table {
    let settings = state.config.provider_settings();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Last Error").fg(Color::White),
    ]);

    for (index, descriptor) in descriptors.iter().enumerate() {
        let provider_type = settings
            .iter()
            .find(|s| s.name == descriptor.name)
            .map(|s| s.provider_type.to_string())
            .unwrap_or_else(|| "-".to_string());

        let status = if descriptor.is_available {
            Cell::new("available").fg(Color::Green)
        } else {
            Cell::new("unavailable").fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(index + 1).fg(Color::Cyan),
            Cell::new(&descriptor.name).fg(Color::White),
            Cell::new(provider_type).fg(Color::DarkGrey),
            Cell::new(&descriptor.model).fg(Color::DarkGrey),
            status,
            Cell::new(truncate(descriptor.last_error.as_deref().unwrap_or("-"), 40))
                .fg(Color::DarkGrey),
        ]);
    }

    table
}
