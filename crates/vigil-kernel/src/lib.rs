// config module - multi-format loading with env substitution
pub mod config;

// error module
pub mod error;
pub use error::{GatewayError, GatewayResult};

// gateway module - contracts for the model runtime and retrieval subsystem
pub mod gateway;
pub use gateway::*;

// tier module
pub mod tier;
pub use tier::QuantizationTier;

// serde helpers for durations written as seconds
pub mod duration_secs;
