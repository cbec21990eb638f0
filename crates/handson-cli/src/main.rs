//! Hands On AI command-line entry point.
//!
//! Binary name: `handson`
//!
//! Parses CLI arguments, loads configuration and providers, then dispatches
//! to the matching command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::dispatch::AskOptions;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = handson_observe::init_tracing(cli.log_filter(), cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "handson", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.config.as_deref()).await?;
    let json = cli.json;

    let outcome = match cli.command {
        Commands::Ask {
            prompt,
            provider,
            model,
            max_tokens,
            temperature,
        } => {
            let options = AskOptions {
                provider,
                model,
                max_tokens,
                temperature,
            };
            cli::dispatch::ask(&state, prompt, options, json).await
        }
        Commands::Parallel { prompt } => cli::dispatch::parallel(&state, prompt, json).await,
        Commands::Merge { prompt } => cli::dispatch::merge(&state, prompt, json).await,
        Commands::Board { prompt } => cli::dispatch::board(&state, prompt, json).await,
        Commands::Providers { validate } => cli::provider::providers(&state, validate, json).await,
        Commands::Status => cli::status::status(&state, json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    handson_observe::shutdown_tracing();
    outcome
}
