//! `vigil status` command implementation

use crate::config::VigilConfig;
use crate::context::VigilContext;
use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};
use colored::Colorize;
use serde::Serialize;
use vigil_foundation::HealthSnapshot;
use vigil_foundation::circuit_breaker::CircuitBreakerSnapshot;

#[derive(Debug, Serialize)]
struct StatusReport {
    model: String,
    available: bool,
    snapshot: HealthSnapshot,
    cache_entries: usize,
    quantization_advised: bool,
}

/// Execute the `vigil status` command
pub async fn run(config: VigilConfig, format: OutputFormat, metrics: bool) -> CliResult<()> {
    let ctx = VigilContext::new(config)?;

    let available = ctx.ollama.check_availability().await.unwrap_or(false);
    let snapshot = ctx.monitor.check_health().await;

    if metrics {
        print!("{}", ctx.metrics.render()?);
        return Ok(());
    }

    let report = StatusReport {
        model: ctx.ollama.active_model(),
        available,
        snapshot: (*snapshot).clone(),
        cache_entries: ctx.protected.cache().map_or(0, |cache| cache.len()),
        quantization_advised: ctx.memory.should_use_quantization(),
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    let overall = if report.snapshot.is_healthy() {
        "healthy".green().bold()
    } else {
        "degraded".red().bold()
    };
    println!("Vigil status: {overall}");
    let reachable = if report.available {
        "reachable".green()
    } else {
        "unreachable".red()
    };
    println!("Model: {} ({reachable})", report.model.cyan());
    println!("Cached responses: {}", report.cache_entries);
    if report.quantization_advised {
        println!("{}", "Memory above the configured limit; lighter tiers advised".yellow());
    }
    println!();
    print!("{}", report.snapshot);
    for breaker in &report.snapshot.breakers {
        print_breaker(breaker);
    }
}

fn print_breaker(breaker: &CircuitBreakerSnapshot) {
    println!();
    println!("Circuit breaker '{}' metrics:", breaker.name.bold());
    print!("{}", breaker.metrics);
}
