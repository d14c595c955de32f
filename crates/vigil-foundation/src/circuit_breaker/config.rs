//! Circuit Breaker Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Name/identifier for this circuit breaker
    pub name: String,
    /// Failures (within the reset window) before opening the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial request is let through
    #[serde(with = "vigil_kernel::duration_secs")]
    pub recovery_timeout: Duration,
    /// Failure count resets when no failure was seen for this long
    #[serde(with = "vigil_kernel::duration_secs")]
    pub failure_count_reset_window: Duration,
    /// Whether the circuit breaker is enabled
    pub enabled: bool,
    /// Upper bound on a single protected call, if any
    #[serde(with = "vigil_kernel::duration_secs::option")]
    pub call_timeout: Option<Duration>,
    /// Whether to count timeouts as failures
    pub count_timeouts_as_failures: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            failure_count_reset_window: Duration::from_secs(60),
            enabled: true,
            call_timeout: None,
            count_timeouts_as_failures: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_reset_window(mut self, window: Duration) -> Self {
        self.failure_count_reset_window = window;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Opens after three failures; the setting used for the model and
    /// retrieval gateways.
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            ..Default::default()
        }
    }

    /// Tolerates bursts of failures and waits longer before probing.
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(60),
            failure_count_reset_window: Duration::from_secs(120),
            ..Default::default()
        }
    }

    /// Create a disabled configuration (no circuit breaking)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Replace unusable values with defaults, logging each replacement.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.failure_threshold == 0 {
            tracing::warn!(
                breaker = %self.name,
                fallback = defaults.failure_threshold,
                "failure_threshold must be > 0, using default"
            );
            self.failure_threshold = defaults.failure_threshold;
        }
        if self.failure_count_reset_window.is_zero() {
            tracing::warn!(
                breaker = %self.name,
                "failure_count_reset_window must be > 0, using default"
            );
            self.failure_count_reset_window = defaults.failure_count_reset_window;
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            tracing::warn!(breaker = %self.name, "call_timeout of 0 ignored");
            self.call_timeout = None;
        }
        self
    }
}
