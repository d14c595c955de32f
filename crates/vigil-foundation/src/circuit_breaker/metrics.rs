//! Circuit Breaker Metrics
//!
//! Counters and a bounded transition history, readable without taking the
//! breaker's state lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::state::State;

const MAX_TRANSITIONS: usize = 50;

/// State transition event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: State,
    pub to_state: State,
    pub at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(from_state: State, to_state: State) -> Self {
        Self {
            from_state,
            to_state,
            at: Utc::now(),
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Default)]
pub struct CircuitBreakerMetrics {
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    /// Calls short-circuited while the breaker was open
    total_rejected: AtomicU64,
    total_transitions: AtomicU64,
    transitions: Mutex<VecDeque<StateTransition>>,
    last_opened_at: Mutex<Option<DateTime<Utc>>>,
    last_closed_at: Mutex<Option<DateTime<Utc>>>,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self, transition: StateTransition) {
        self.total_transitions.fetch_add(1, Ordering::Relaxed);
        match transition.to_state {
            State::Open => *self.last_opened_at.lock() = Some(transition.at),
            State::Closed => *self.last_closed_at.lock() = Some(transition.at),
            State::HalfOpen => {}
        }

        let mut transitions = self.transitions.lock();
        transitions.push_back(transition);
        while transitions.len() > MAX_TRANSITIONS {
            transitions.pop_front();
        }
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected.load(Ordering::Relaxed)
    }

    pub fn total_transitions(&self) -> u64 {
        self.total_transitions.load(Ordering::Relaxed)
    }

    /// Successes plus failures; rejected calls never reached the downstream.
    pub fn total_requests(&self) -> u64 {
        self.total_successes() + self.total_failures()
    }

    /// Failure rate as a percentage (0-100)
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (self.total_failures() as f64 / total as f64) * 100.0
    }

    /// Most recent `n` transitions, oldest first
    pub fn recent_transitions(&self, n: usize) -> Vec<StateTransition> {
        let transitions = self.transitions.lock();
        let skip = transitions.len().saturating_sub(n);
        transitions.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> CircuitBreakerMetricsSnapshot {
        CircuitBreakerMetricsSnapshot {
            total_successes: self.total_successes(),
            total_failures: self.total_failures(),
            total_rejected: self.total_rejected(),
            total_requests: self.total_requests(),
            failure_rate: self.failure_rate(),
            total_transitions: self.total_transitions(),
            last_opened_at: *self.last_opened_at.lock(),
            last_closed_at: *self.last_closed_at.lock(),
        }
    }
}

/// Serializable metrics for status output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetricsSnapshot {
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
    pub total_requests: u64,
    pub failure_rate: f64,
    pub total_transitions: u64,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub last_closed_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for CircuitBreakerMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Total Requests: {}", self.total_requests)?;
        writeln!(f, "  Successes: {}", self.total_successes)?;
        writeln!(f, "  Failures: {}", self.total_failures)?;
        writeln!(f, "  Rejected: {}", self.total_rejected)?;
        writeln!(f, "  Failure Rate: {:.2}%", self.failure_rate)?;
        writeln!(f, "  State Transitions: {}", self.total_transitions)?;
        if let Some(at) = self.last_opened_at {
            writeln!(f, "  Last Opened: {}", at.to_rfc3339())?;
        }
        if let Some(at) = self.last_closed_at {
            writeln!(f, "  Last Closed: {}", at.to_rfc3339())?;
        }
        Ok(())
    }
}
