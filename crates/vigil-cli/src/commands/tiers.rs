//! `vigil tiers` command implementation

use crate::config::VigilConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use serde::Serialize;
use vigil_foundation::{MemoryProbe, MemoryReading, QuantizationLadder, TierDecision};
use vigil_kernel::QuantizationTier;

#[derive(Debug, Serialize)]
struct TiersReport<'a> {
    tiers: &'a [QuantizationTier],
    current: QuantizationTier,
    memory_percent: f64,
    complexity: Option<f64>,
    decision: TierDecision,
}

/// Execute the `vigil tiers` command
pub fn run(
    config: &VigilConfig,
    memory: Option<f64>,
    current: Option<String>,
    complexity: Option<f64>,
    format: OutputFormat,
) -> CliResult<()> {
    let critical = config.memory.critical_memory_percent;
    let reading = match memory {
        Some(percent) if !(0.0..=100.0).contains(&percent) => {
            return Err(CliError::InvalidArgument(format!(
                "memory percent must be within 0-100, got {percent}"
            )));
        }
        Some(percent) => MemoryReading::with_percent(percent, critical),
        None => MemoryProbe::system(critical).sample(),
    };

    let ladder = QuantizationLadder::new(config.quantization.clone());
    let current = QuantizationTier::from(current.unwrap_or_else(|| config.model.quantization.clone()));
    let decision = ladder.select_tier(&current, Some(&reading), complexity);

    let report = TiersReport {
        tiers: ladder.tiers(),
        current,
        memory_percent: reading.percent_used,
        complexity,
        decision,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &TiersReport<'_>) {
    println!("{}", "Quantization ladder (lowest first)".bold());
    for tier in report.tiers {
        let marker = if *tier == report.current {
            "*".green().bold()
        } else if tier == report.decision.target() {
            ">".yellow().bold()
        } else {
            " ".normal()
        };
        println!("  {marker} {tier}");
    }
    println!();
    println!("Memory: {:.1}%", report.memory_percent);
    if let Some(score) = report.complexity {
        println!("Complexity: {score:.2}");
    }
    match &report.decision {
        TierDecision::Unchanged { tier } => {
            println!("Decision: stay on {}", tier.to_string().green());
        }
        TierDecision::Change { from, to, reason } => {
            println!(
                "Decision: {} -> {} ({reason})",
                from,
                to.to_string().yellow().bold()
            );
        }
    }
}
