//! `vigil.toml` loading

use crate::error::CliResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vigil_foundation::{CircuitBreakerConfig, MemoryConfig, MonitorConfig, QuantizationConfig};
use vigil_kernel::config::{load_or_default, load_with_env};
use vigil_local_llm::OllamaConfig;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

/// Prefix for `VIGIL_SECTION__KEY` environment overrides.
pub const ENV_PREFIX: &str = "VIGIL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub model: CircuitBreakerConfig,
    pub rag: CircuitBreakerConfig,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            model: CircuitBreakerConfig {
                name: "model".to_string(),
                ..CircuitBreakerConfig::strict()
            },
            rag: CircuitBreakerConfig {
                name: "rag".to_string(),
                ..CircuitBreakerConfig::strict()
            },
        }
    }
}

/// Complete configuration of the `vigil` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub model: OllamaConfig,
    pub memory: MemoryConfig,
    pub quantization: QuantizationConfig,
    pub breakers: BreakerSettings,
    pub monitor: MonitorConfig,
}

impl VigilConfig {
    /// Apply the Ollama environment overrides from `lookup`, then replace
    /// invalid values with defaults.
    pub fn finish_with(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            model: self.model.with_overrides_from(lookup).validated(),
            memory: self.memory.validated(),
            quantization: self.quantization.validated(),
            breakers: BreakerSettings {
                model: self.breakers.model.validated(),
                rag: self.breakers.rag.validated(),
            },
            monitor: self.monitor.validated(),
        }
    }
}

/// Load `path`, or `vigil.toml` when present, or the defaults.
///
/// An explicitly requested file must exist.
pub fn load(path: Option<&Path>) -> CliResult<VigilConfig> {
    let config: VigilConfig = match path {
        Some(path) => {
            let config = load_with_env(path, ENV_PREFIX)?;
            tracing::info!(path = %path.display(), "configuration loaded");
            config
        }
        None => load_or_default(DEFAULT_CONFIG_FILE, ENV_PREFIX)?,
    };
    Ok(config.finish_with(|key| std::env::var(key).ok()))
}
