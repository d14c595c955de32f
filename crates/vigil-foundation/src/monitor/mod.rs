//! Health monitoring and automatic recovery

pub mod config;
pub mod health;
pub mod health_monitor;
pub mod recovery;

pub use config::MonitorConfig;
pub use health::{Component, ComponentHealth, HealthSnapshot};
pub use health_monitor::{HealthMonitor, HealthMonitorBuilder};
pub use recovery::{RecoveryReport, StrategyOutcome, recover_memory, recover_model, recover_rag};
