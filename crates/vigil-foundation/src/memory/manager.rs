//! Memory policy built on top of [`MemoryProbe`]: caching admission,
//! quantization hints, chunk sizing and pressure relief.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::probe::{MemoryProbe, MemoryReading};
use crate::cache::ResponseCache;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Above this percent the system is under pressure
    pub max_memory_percent: f64,
    /// At or above this percent a reading is critical
    pub critical_memory_percent: f64,
    /// Capacity of the response cache
    pub response_cache_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_percent: 80.0,
            critical_memory_percent: 90.0,
            response_cache_size: 100,
        }
    }
}

impl MemoryConfig {
    /// Replace out-of-range or mis-ordered thresholds with defaults.
    pub fn validated(self) -> Self {
        let in_range = |p: f64| p.is_finite() && p > 0.0 && p <= 100.0;
        if in_range(self.max_memory_percent)
            && in_range(self.critical_memory_percent)
            && self.max_memory_percent <= self.critical_memory_percent
        {
            return self;
        }

        let defaults = Self::default();
        tracing::warn!(
            max = self.max_memory_percent,
            critical = self.critical_memory_percent,
            "invalid memory thresholds, using defaults {}/{}",
            defaults.max_memory_percent,
            defaults.critical_memory_percent
        );
        Self {
            response_cache_size: self.response_cache_size,
            ..defaults
        }
    }
}

/// Decisions that depend on current memory usage.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    probe: MemoryProbe,
    config: MemoryConfig,
    cache: Option<Arc<ResponseCache>>,
}

impl MemoryManager {
    pub fn new(probe: MemoryProbe, config: MemoryConfig) -> Self {
        let config = config.validated();
        tracing::info!(
            max = config.max_memory_percent,
            critical = config.critical_memory_percent,
            "memory manager initialized"
        );
        Self {
            probe,
            config,
            cache: None,
        }
    }

    /// Attach the response cache released by [`Self::reduce_memory_pressure`].
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn probe(&self) -> &MemoryProbe {
        &self.probe
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn sample(&self) -> MemoryReading {
        self.probe.sample()
    }

    /// Whether memory use is high enough to prefer a lighter tier.
    pub fn should_use_quantization(&self) -> bool {
        self.probe.sample().percent_used > self.config.max_memory_percent
    }

    /// Whether new responses may be cached right now.
    pub fn should_cache(&self) -> bool {
        self.probe.sample().percent_used <= self.config.max_memory_percent
    }

    /// Chunk size for splitting a text of `text_len` characters, shrinking
    /// under memory pressure and growing when memory is plentiful.
    pub fn adaptive_chunk_size(&self, text_len: usize, base: usize) -> usize {
        let usage = self.probe.sample().percent_used;

        if usage > self.config.critical_memory_percent {
            return (base / 5).max(200);
        }
        if usage > self.config.max_memory_percent {
            return (base / 2).max(500);
        }

        if text_len > 1_000_000 {
            return base.min(800);
        }
        if text_len > 100_000 {
            return base;
        }
        if usage < 50.0 {
            return base.saturating_mul(2).min(2000);
        }
        base
    }

    /// Release what this process holds on to. Returns whether anything was
    /// freed.
    pub fn reduce_memory_pressure(&self) -> bool {
        tracing::info!("reducing memory pressure");
        match &self.cache {
            Some(cache) => {
                let cleared = cache.clear();
                tracing::debug!(cleared, "cleared response cache");
                cleared > 0
            }
            None => false,
        }
    }
}
