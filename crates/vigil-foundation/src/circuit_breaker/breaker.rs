//! The breaker itself: a three-state machine guarding one downstream.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::config::CircuitBreakerConfig;
use super::metrics::{CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot, StateTransition};
use super::state::State;

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker rejected the call without invoking the operation.
    #[error("circuit breaker '{name}' is {state}")]
    CircuitOpen { name: String, state: State },
    /// The operation exceeded the configured call timeout.
    #[error("call through circuit breaker '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
    /// The operation ran and failed; the original error is preserved.
    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The operation's own error, if the operation ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Point-in-time view of a breaker, for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: State,
    pub failure_count: u32,
    pub metrics: CircuitBreakerMetricsSnapshot,
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Circuit breaker guarding calls to a single downstream component.
///
/// Every transition happens under one lock, so concurrent callers never
/// observe a half-applied state change.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    metrics: CircuitBreakerMetrics,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: config.validated(),
            inner: Mutex::new(Inner::default()),
            metrics: CircuitBreakerMetrics::new(),
        }
    }

    /// Shorthand for a breaker with default settings and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(CircuitBreakerConfig::new(name))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CircuitBreakerMetrics {
        &self.metrics
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Whether a request may proceed right now.
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open
    /// and lets the request through.
    pub fn allow_request(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let now = Instant::now();
                let elapsed = inner
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.recovery_timeout {
                    self.transition(&mut inner, State::HalfOpen);
                    true
                } else {
                    self.metrics.record_rejected();
                    false
                }
            }
        }
    }

    /// Record a successful call. Closes a half-open breaker.
    pub fn record_success(&self) {
        self.metrics.record_success();
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.state == State::HalfOpen {
            inner.failure_count = 0;
            inner.opened_at = None;
            self.transition(&mut inner, State::Closed);
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        self.metrics.record_failure();
        if !self.config.enabled {
            return;
        }

        let now = Instant::now();
        let mut inner = self.inner.lock();
        let quiet_for = inner
            .last_failure_at
            .map(|last| now.saturating_duration_since(last));
        if quiet_for.is_some_and(|quiet| quiet > self.config.failure_count_reset_window) {
            inner.failure_count = 0;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(now);

        match inner.state {
            State::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.opened_at = Some(now);
                self.transition(&mut inner, State::Open);
            }
            State::HalfOpen => {
                inner.opened_at = Some(now);
                self.transition(&mut inner, State::Open);
            }
            _ => {}
        }
    }

    /// Run `op` through the breaker.
    ///
    /// The operation is not invoked at all when the breaker rejects the call.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(op, |_| true).await
    }

    /// Like [`Self::call`], but only errors for which `counts` returns true
    /// are recorded as failures. Other errors leave the breaker untouched.
    pub async fn call_classified<F, Fut, T, E, C>(
        &self,
        op: F,
        counts: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        if !self.allow_request() {
            return Err(CircuitBreakerError::CircuitOpen {
                name: self.config.name.clone(),
                state: self.state(),
            });
        }

        let outcome = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => {
                    if self.config.count_timeouts_as_failures {
                        self.record_failure();
                    }
                    tracing::debug!(breaker = %self.config.name, timeout = ?limit, "call timed out");
                    return Err(CircuitBreakerError::Timeout {
                        name: self.config.name.clone(),
                        timeout: limit,
                    });
                }
            },
            None => op().await,
        };

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                if counts(&e) {
                    self.record_failure();
                }
                Err(CircuitBreakerError::Operation(e))
            }
        }
    }

    /// Force the breaker back to closed with a clean failure count.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.opened_at = None;
        if inner.state != State::Closed {
            self.transition(&mut inner, State::Closed);
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let (state, failure_count) = {
            let inner = self.inner.lock();
            (inner.state, inner.failure_count)
        };
        CircuitBreakerSnapshot {
            name: self.config.name.clone(),
            state,
            failure_count,
            metrics: self.metrics.snapshot(),
        }
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from = inner.state;
        inner.state = to;
        self.metrics.record_transition(StateTransition::new(from, to));

        match to {
            State::Open => tracing::warn!(
                breaker = %self.config.name,
                failures = inner.failure_count,
                recovery_timeout = ?self.config.recovery_timeout,
                "circuit breaker opened"
            ),
            State::HalfOpen => tracing::info!(
                breaker = %self.config.name,
                "circuit breaker half-open, allowing trial request"
            ),
            State::Closed => tracing::info!(breaker = %self.config.name, "circuit breaker closed"),
        }
    }
}
