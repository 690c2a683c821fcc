//! NextStep CLI - ask an AI backend for the next step in a game.
//!
//! Runs the guide orchestrator on a spawned task, streams status lines to
//! stderr while it works, and prints the report to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use nextstep::guide::{self, GuideRequest, Provider};
use nextstep::inference::config::{load_config, load_or_default};
use nextstep::inference::{GuideConfig, ProviderTransport};
use nextstep::status::StatusSink;

/// NextStep guide CLI
#[derive(Parser)]
#[command(name = "nextstep")]
#[command(about = "NextStep - grounded next-step hints for the game you are playing", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to nextstep.yaml (overrides $NEXTSTEP_CONFIG and discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the log file as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate guide suggestions for a progress note
    Guide {
        /// Game title
        #[arg(long)]
        game: String,

        /// Where the player currently is and what they have done
        #[arg(long)]
        situation: String,

        /// What the player is trying to do right now
        #[arg(long)]
        objective: Option<String>,

        /// Free-text directive changing tone or structure
        #[arg(long)]
        behavior: Option<String>,

        /// Gemini, ChatGPT or Claude (defaults to the configured active provider)
        #[arg(long)]
        provider: Option<String>,

        /// Credential for the selected provider (defaults to the configured key)
        #[arg(long, env = "NEXTSTEP_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Print the full result as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Show configured providers and the grounded model fallback order
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = nextstep::init_tracing(cli.json_logs) {
        eprintln!("warning: file logging disabled: {e}");
    }

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_or_default(&std::env::current_dir()?).context("failed to load config")?,
    };

    match cli.command {
        Commands::Guide {
            game,
            situation,
            objective,
            behavior,
            provider,
            api_key,
            json,
        } => {
            let provider = Provider::parse(provider.as_deref().unwrap_or(&config.active_provider));
            let credential = api_key
                .or_else(|| config.api_key_for(provider.display_name()).map(str::to_string))
                .unwrap_or_default();
            let request = GuideRequest::new(game, situation, provider, credential)
                .with_objective(objective)
                .with_behavior(behavior);
            run_guide(config, request, json).await
        }
        Commands::Providers => {
            print_providers(&config);
            Ok(())
        }
    }
}

async fn run_guide(config: GuideConfig, request: GuideRequest, json: bool) -> Result<()> {
    let transport = ProviderTransport::from_config(&config)?;
    let (sink, mut rx) = StatusSink::channel();

    let task = tokio::spawn(async move {
        guide::run(&transport, &request, &config.fallback, &sink).await
    });

    while let Some(update) = rx.recv().await {
        eprintln!(
            "[{}] {}",
            update.at.with_timezone(&Local).format("%H:%M:%S"),
            update.message
        );
    }

    let result = task.await.context("guide task aborted")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.guides.is_empty() {
        println!("No guide suggestions were returned. Please try again with more context.");
    } else {
        println!("{}", result.report());
    }
    Ok(())
}

fn print_providers(config: &GuideConfig) {
    let providers = &config.providers;
    let key_state = |name: &str| {
        if config.api_key_for(name).is_some() {
            "key configured"
        } else {
            "no key"
        }
    };

    println!("Active provider: {}", config.active_provider);
    println!();
    println!(
        "Gemini   {} ({})",
        providers.gemini.base_url,
        key_state("Gemini")
    );
    for (i, model) in providers.gemini.models.iter().enumerate() {
        println!("  {}. {model}", i + 1);
    }
    println!(
        "ChatGPT  {} model {} ({})",
        providers.openai.base_url,
        providers.openai.model,
        key_state("ChatGPT")
    );
    println!(
        "Claude   {} model {} ({})",
        providers.anthropic.base_url,
        providers.anthropic.model,
        key_state("Claude")
    );
}
