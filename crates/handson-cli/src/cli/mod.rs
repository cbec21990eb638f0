//! CLI command definitions for the `handson` binary.
//!
//! Uses clap derive macros for argument parsing. Each dispatch mode of the
//! engine is one subcommand (`ask`, `parallel`, `merge`, `board`).

pub mod dispatch;
pub mod provider;
pub mod render;
pub mod status;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Send prompts to several LLM providers and combine their answers.
#[derive(Parser)]
#[command(name = "handson", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to <data dir>/handson.toml).
    #[arg(long, global = true, value_name = "PATH", env = "HANDSON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans to stdout as OpenTelemetry JSON.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter for the selected verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,handson_core=debug,handson_infra=debug",
            _ => "trace",
        }
    }
}

/// Prompt plus the system prompt shared by every dispatch command.
#[derive(Args, Debug, Clone)]
pub struct PromptArgs {
    /// The prompt to send.
    pub prompt: String,

    /// System prompt sent with the request.
    #[arg(long, short)]
    pub system: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send the prompt to one provider (round-robin unless --provider is given).
    Ask {
        #[command(flatten)]
        prompt: PromptArgs,

        /// Provider to use.
        #[arg(long, short)]
        provider: Option<String>,

        /// Model override for the selected provider.
        #[arg(long, short)]
        model: Option<String>,

        /// Maximum output tokens.
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature.
        #[arg(long)]
        temperature: Option<f64>,
    },

    /// Send the prompt to every available provider and print each answer.
    Parallel {
        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// Fan out, then keep the answer the merge heuristic scores highest.
    Merge {
        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// Fan out, then let an evaluator model pick the best answer.
    Board {
        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// List configured providers and their availability.
    #[command(alias = "ls")]
    Providers {
        /// Check each provider's API key with a minimal request.
        #[arg(long)]
        validate: bool,
    },

    /// Show usage counters, ceilings and rotation state.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_flags() {
        let cli = Cli::try_parse_from([
            "handson", "--json", "ask", "Hello", "--provider", "openai", "-s", "Be brief",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Ask {
                prompt, provider, ..
            } => {
                assert_eq!(prompt.prompt, "Hello");
                assert_eq!(prompt.system.as_deref(), Some("Be brief"));
                assert_eq!(provider.as_deref(), Some("openai"));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_log_filter_follows_verbosity() {
        let quiet = Cli::try_parse_from(["handson", "-q", "status"]).unwrap();
        assert_eq!(quiet.log_filter(), "error");
        let verbose = Cli::try_parse_from(["handson", "-vv", "status"]).unwrap();
        assert_eq!(verbose.log_filter(), "trace");
        let default = Cli::try_parse_from(["handson", "status"]).unwrap();
        assert_eq!(default.log_filter(), "warn");
    }
}
