//! Vigil CLI - run and inspect the adaptive resilience controller

mod cli;
mod commands;
mod config;
mod context;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command_async(cli))
}

async fn run_command_async(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.unwrap_or_default();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Status { metrics } => {
            commands::status::run(config, format, metrics).await?;
        }

        Commands::Generate {
            prompt,
            system,
            max_tokens,
            tier,
            temperature,
        } => {
            let request = commands::generate::GenerateRequest {
                prompt,
                system,
                max_tokens,
                tier,
                temperature,
            };
            commands::generate::run(config, request, format).await?;
        }

        Commands::Monitor { interval, cycles } => {
            commands::monitor::run(config, interval, cycles, format).await?;
        }

        Commands::Complexity { text } => {
            commands::complexity::run(&text, format)?;
        }

        Commands::Tiers {
            memory,
            current,
            complexity,
        } => {
            commands::tiers::run(&config, memory, current, complexity, format)?;
        }
    }

    Ok(())
}
