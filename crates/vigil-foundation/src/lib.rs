//! Resilience core for a local LLM runtime.
//!
//! - [`memory`]: host memory sampling, trend tracking and memory policy
//! - [`quantization`]: tier ladder, complexity heuristic and live tier control
//! - [`circuit_breaker`]: fail-fast protection for downstream calls
//! - [`gateway`]: breaker-protected and tier-adaptive gateway wrappers
//! - [`monitor`]: periodic health checks with automatic recovery
//! - [`metrics`]: Prometheus gauges and latency histograms

// cache module - bounded LRU of generated responses
pub mod cache;

// circuit breaker module
pub mod circuit_breaker;

// gateway compositions
pub mod gateway;

// memory module
pub mod memory;

// metrics module
pub mod metrics;

// health monitor module
pub mod monitor;

// quantization module
pub mod quantization;

pub use cache::ResponseCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, State};
pub use gateway::{AdaptiveModelGateway, ProtectedModelGateway, ProtectedRetrievalGateway};
pub use memory::{MemoryConfig, MemoryManager, MemoryProbe, MemoryReading};
pub use metrics::{MetricsError, VigilMetrics};
pub use monitor::{HealthMonitor, HealthSnapshot, MonitorConfig};
pub use quantization::{QuantizationConfig, QuantizationLadder, TierController, TierDecision};
