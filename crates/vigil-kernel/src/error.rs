//! Gateway error taxonomy
//!
//! Every failure coming back from the model runtime or the retrieval
//! subsystem is a [`GatewayError`]. All variants except
//! [`GatewayError::CircuitOpen`] count toward circuit-breaker failure
//! accounting; `CircuitOpen` is synthesized locally when a breaker refuses
//! a call so callers can surface a "temporarily unavailable" message.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Network-level failure talking to the downstream process
    #[error("transport error: {0}")]
    Transport(String),

    /// Downstream answered with a non-success status
    #[error("downstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Downstream process exited or refused the request
    #[error("process failed: {0}")]
    ProcessFailed(String),

    /// Call did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The gateway does not implement the requested operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Circuit breaker refused the call without invoking the downstream
    #[error("service temporarily unavailable: circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// True when the error was synthesized by an open circuit breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// True when the error should count toward breaker failure accounting.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::CircuitOpen { .. } | Self::Unsupported(_))
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
