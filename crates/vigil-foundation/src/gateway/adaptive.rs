//! Model gateway that picks the quantization tier per request.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use vigil_kernel::{CacheControl, GatewayResult, GenerateOptions, ModelGateway, ModelReload};

use crate::memory::MemoryProbe;
use crate::metrics::VigilMetrics;
use crate::quantization::{TierController, estimate_complexity};

/// Before each generation, scores the prompt, samples memory and lets the
/// [`TierController`] adapt; the resulting tier is attached to the call.
///
/// A tier set explicitly by the caller is left alone.
pub struct AdaptiveModelGateway {
    inner: Arc<dyn ModelGateway>,
    controller: Arc<TierController>,
    probe: Option<MemoryProbe>,
    metrics: Option<Arc<VigilMetrics>>,
}

impl AdaptiveModelGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, controller: Arc<TierController>) -> Self {
        Self {
            inner,
            controller,
            probe: None,
            metrics: None,
        }
    }

    pub fn with_probe(mut self, probe: MemoryProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Observe the latency of successful generations per model and tier.
    pub fn with_metrics(mut self, metrics: Arc<VigilMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn controller(&self) -> &Arc<TierController> {
        &self.controller
    }

    async fn timed_generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String> {
        let started = Instant::now();
        let response = self.inner.generate(prompt, options).await?;
        if let Some(metrics) = &self.metrics {
            let tier = options
                .tier
                .as_ref()
                .map_or("default", |tier| tier.as_str());
            metrics.observe_inference(self.inner.name(), tier, started.elapsed());
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelGateway for AdaptiveModelGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String> {
        if options.tier.is_some() {
            return self.timed_generate(prompt, options).await;
        }

        let complexity = estimate_complexity(prompt).value();
        let reading = self.probe.as_ref().map(MemoryProbe::sample);
        if let Err(e) = self.controller.adapt(reading.as_ref(), Some(complexity)).await {
            tracing::warn!(error = %e, "tier adaptation failed, keeping current tier");
        }

        let mut options = options.clone();
        options.tier = Some(self.controller.current());
        self.timed_generate(prompt, &options).await
    }

    fn reloader(&self) -> Option<&dyn ModelReload> {
        self.inner.reloader()
    }

    fn cache_control(&self) -> Option<&dyn CacheControl> {
        self.inner.cache_control()
    }
}
