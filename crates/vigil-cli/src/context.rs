//! Component wiring shared by the commands that talk to the model runtime

use crate::config::VigilConfig;
use crate::error::CliResult;
use std::sync::Arc;
use vigil_foundation::{
    AdaptiveModelGateway, CircuitBreaker, HealthMonitor, MemoryManager, MemoryProbe,
    ProtectedModelGateway, QuantizationLadder, ResponseCache, TierController, VigilMetrics,
};
use vigil_local_llm::OllamaGateway;

/// Fully wired controller: Ollama behind a breaker and cache, tier adaptation
/// on top, and a health monitor over both.
pub struct VigilContext {
    pub config: VigilConfig,
    pub ollama: Arc<OllamaGateway>,
    pub memory: Arc<MemoryManager>,
    pub tiers: Arc<TierController>,
    pub protected: Arc<ProtectedModelGateway>,
    pub adaptive: AdaptiveModelGateway,
    pub monitor: HealthMonitor,
    pub metrics: Arc<VigilMetrics>,
}

impl VigilContext {
    pub fn new(config: VigilConfig) -> CliResult<Self> {
        let ollama = Arc::new(OllamaGateway::new(config.model.clone())?);
        let metrics = Arc::new(VigilMetrics::new()?);
        let probe = MemoryProbe::system(config.memory.critical_memory_percent);
        let cache = Arc::new(ResponseCache::new(config.memory.response_cache_size));
        let memory = Arc::new(
            MemoryManager::new(probe.clone(), config.memory.clone()).with_cache(cache.clone()),
        );

        let ladder = QuantizationLadder::new(config.quantization.clone());
        let tiers = Arc::new(
            TierController::new(ladder, config.model.quantization.clone())
                .with_switch(ollama.clone()),
        );

        let breaker = Arc::new(CircuitBreaker::new(config.breakers.model.clone()));
        let protected = Arc::new(
            ProtectedModelGateway::new(ollama.clone(), breaker)
                .with_cache(cache)
                .with_memory_manager(memory.clone()),
        );
        let adaptive = AdaptiveModelGateway::new(protected.clone(), tiers.clone())
            .with_probe(probe.clone())
            .with_metrics(metrics.clone());

        let monitor = HealthMonitor::builder(protected.clone(), probe)
            .config(config.monitor.clone())
            .memory_manager(memory.clone())
            .tier_controller(tiers.clone())
            .metrics(metrics.clone())
            .build();

        tracing::debug!(
            model = %config.model.model_name,
            base_url = %config.model.base_url,
            tier = %tiers.current(),
            "vigil context initialized"
        );

        Ok(Self {
            config,
            ollama,
            memory,
            tiers,
            protected,
            adaptive,
            monitor,
            metrics,
        })
    }
}
