//! Configuration for the Ollama gateway

use serde::{Deserialize, Serialize};

/// Connection and sampling defaults for the Ollama gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server root, without the `/api` suffix
    pub base_url: String,

    /// Model tag to start with, e.g. `llama3:latest`
    pub model_name: String,

    /// Quantization tier the model starts at
    pub quantization: String,

    /// Context window passed as `num_ctx`
    pub context_length: u32,

    /// Sampling temperature (0.0 = greedy)
    pub temperature: f32,

    /// Top-p nucleus sampling threshold
    pub top_p: f32,

    /// Default cap on generated tokens; unlimited when unset
    pub max_tokens: Option<u32>,

    /// Per-request timeout for generation
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model_name: "llama3:latest".to_string(),
            quantization: "q4_0".to_string(),
            context_length: 4096,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `OLLAMA_BASE_URL`, `DEFAULT_MODEL`, `DEFAULT_QUANTIZATION` and
    /// `CONTEXT_LENGTH` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            self.model_name = model;
        }
        if let Some(quantization) = lookup("DEFAULT_QUANTIZATION") {
            self.quantization = quantization;
        }
        if let Some(raw) = lookup("CONTEXT_LENGTH") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.context_length = n,
                _ => tracing::warn!(value = %raw, "ignoring invalid CONTEXT_LENGTH"),
            }
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_quantization(mut self, quantization: impl Into<String>) -> Self {
        self.quantization = quantization.into();
        self
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temp: f32) -> Result<Self, &'static str> {
        if !(0.0..=2.0).contains(&temp) {
            return Err("temperature must be between 0.0 and 2.0");
        }
        self.temperature = temp;
        Ok(self)
    }

    pub fn with_top_p(mut self, top_p: f32) -> Result<Self, &'static str> {
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err("top_p must be in (0.0, 1.0]");
        }
        self.top_p = top_p;
        Ok(self)
    }

    pub fn with_context_length(mut self, tokens: u32) -> Result<Self, &'static str> {
        if tokens == 0 {
            return Err("context_length must be > 0");
        }
        self.context_length = tokens;
        Ok(self)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self, &'static str> {
        if secs == 0 {
            return Err("timeout_secs must be > 0");
        }
        self.timeout_secs = secs;
        Ok(self)
    }

    /// Replace out-of-range values (e.g. from a config file) with defaults.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let mut cfg = self;
        if !(0.0..=2.0).contains(&cfg.temperature) {
            tracing::warn!(temperature = cfg.temperature, "temperature out of range, using default");
            cfg.temperature = defaults.temperature;
        }
        if !(cfg.top_p > 0.0 && cfg.top_p <= 1.0) {
            tracing::warn!(top_p = cfg.top_p, "top_p out of range, using default");
            cfg.top_p = defaults.top_p;
        }
        if cfg.context_length == 0 {
            tracing::warn!("context_length must be > 0, using default");
            cfg.context_length = defaults.context_length;
        }
        if cfg.timeout_secs == 0 {
            tracing::warn!("timeout_secs must be > 0, using default");
            cfg.timeout_secs = defaults.timeout_secs;
        }
        if cfg.base_url.trim().is_empty() {
            cfg.base_url = defaults.base_url;
        }
        cfg
    }
}

// ============================================================================
// Tests
// ============================================================================
