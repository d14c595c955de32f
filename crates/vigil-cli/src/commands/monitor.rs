//! `vigil monitor` command implementation

use crate::config::VigilConfig;
use crate::context::VigilContext;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, print_json};
use std::time::Duration;
use vigil_foundation::HealthMonitor;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Execute the `vigil monitor` command
///
/// Runs until Ctrl-C, or until `cycles` check cycles have completed.
pub async fn run(
    config: VigilConfig,
    interval: Option<u64>,
    cycles: Option<u64>,
    format: OutputFormat,
) -> CliResult<()> {
    let ctx = VigilContext::new(config)?;
    let interval = interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(ctx.config.monitor.interval);

    ctx.monitor.start(interval);

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, stopping monitor");
            signal.map_err(CliError::from)
        }
        _ = report_cycles(&ctx.monitor, cycles, format) => Ok(()),
    };

    ctx.monitor.stop().await;
    result
}

/// Print every new snapshot; returns once `limit` cycles have been seen.
async fn report_cycles(monitor: &HealthMonitor, limit: Option<u64>, format: OutputFormat) {
    let mut last_cycle = 0;
    loop {
        let snapshot = monitor.snapshot();
        if snapshot.cycle > last_cycle {
            last_cycle = snapshot.cycle;
            match format {
                OutputFormat::Json => {
                    if let Err(e) = print_json(&*snapshot) {
                        tracing::warn!(error = %e, "failed to render snapshot");
                    }
                }
                OutputFormat::Text => print!("{snapshot}"),
            }
            if limit.is_some_and(|limit| last_cycle >= limit) {
                return;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
