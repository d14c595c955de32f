//! Circuit breaker for downstream calls.
//!
//! ```text
//!   CLOSED --(failures >= threshold)--> OPEN
//!     ^                                   |
//!     | success                           | recovery timeout elapsed
//!     |                                   v
//!     +------------------------------ HALF-OPEN --(failure)--> OPEN
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use vigil_foundation::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::strict());
//! let reply = breaker.call(|| gateway.generate("Hello", &options)).await;
//! ```

pub mod breaker;
pub mod config;
pub mod metrics;
pub mod state;

pub use breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot};
pub use config::CircuitBreakerConfig;
pub use metrics::{CircuitBreakerMetrics, CircuitBreakerMetricsSnapshot, StateTransition};
pub use state::State;
