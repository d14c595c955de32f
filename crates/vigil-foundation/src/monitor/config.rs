//! Health monitor settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between health check cycles
    #[serde(with = "vigil_kernel::duration_secs")]
    pub interval: Duration,
    /// Upper bound on a single component probe
    #[serde(with = "vigil_kernel::duration_secs")]
    pub probe_timeout: Duration,
    /// Upper bound on one component's whole recovery attempt
    #[serde(with = "vigil_kernel::duration_secs")]
    pub recovery_timeout: Duration,
    /// Memory above this percent marks the memory component unhealthy
    pub memory_unhealthy_percent: f64,
    /// Prompt used for the synthetic model probe
    pub probe_prompt: String,
    pub probe_max_tokens: u32,
    /// How long `stop` waits for the background loop to finish
    #[serde(with = "vigil_kernel::duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            recovery_timeout: Duration::from_secs(60),
            memory_unhealthy_percent: 90.0,
            probe_prompt: "Hello".to_string(),
            probe_max_tokens: 5,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl MonitorConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.interval.is_zero() {
            tracing::warn!("monitor interval must be > 0, using default");
            self.interval = defaults.interval;
        }
        if self.probe_timeout.is_zero() {
            tracing::warn!("probe timeout must be > 0, using default");
            self.probe_timeout = defaults.probe_timeout;
        }
        if self.recovery_timeout.is_zero() {
            tracing::warn!("recovery timeout must be > 0, using default");
            self.recovery_timeout = defaults.recovery_timeout;
        }
        let percent = self.memory_unhealthy_percent;
        if !(percent.is_finite() && percent > 0.0 && percent <= 100.0) {
            tracing::warn!(percent, "memory_unhealthy_percent out of range, using default");
            self.memory_unhealthy_percent = defaults.memory_unhealthy_percent;
        }
        if self.probe_prompt.trim().is_empty() {
            self.probe_prompt = defaults.probe_prompt;
        }
        self
    }
}
