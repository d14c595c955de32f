//! CLI definition using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vigil - adaptive resilience controller for a local LLM runtime
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<OutputFormat>,

    /// Configuration file path (defaults to ./vigil.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one health check cycle and print the snapshot with breaker metrics
    Status {
        /// Print the Prometheus text exposition instead of the report
        #[arg(long)]
        metrics: bool,
    },

    /// Generate a completion through the protected, tier-adaptive gateway
    Generate {
        /// Prompt text
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Maximum number of tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Pin a quantization tier instead of adapting to memory pressure
        #[arg(long)]
        tier: Option<String>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Run the background health monitor until interrupted
    Monitor {
        /// Seconds between check cycles (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many completed cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Score the complexity of a piece of text
    Complexity {
        /// Text to score
        text: String,
    },

    /// Show the quantization ladder and the tier the current memory pressure selects
    Tiers {
        /// Memory usage percent to evaluate (samples the host when omitted)
        #[arg(short, long)]
        memory: Option<f64>,

        /// Tier to evaluate from (defaults to the configured model quantization)
        #[arg(long)]
        current: Option<String>,

        /// Content complexity score in [0, 1]
        #[arg(long)]
        complexity: Option<f64>,
    },
}
