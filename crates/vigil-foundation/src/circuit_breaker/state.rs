//! Circuit Breaker State

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Requests flow through; failures are counted.
    #[default]
    Closed,
    /// Requests are rejected until the recovery timeout elapses.
    Open,
    /// One or more trial requests are allowed to test the downstream.
    HalfOpen,
}

impl State {
    pub fn is_closed(&self) -> bool {
        matches!(self, State::Closed)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, State::Open)
    }

    pub fn is_half_open(&self) -> bool {
        matches!(self, State::HalfOpen)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}
