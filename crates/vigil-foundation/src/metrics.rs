//! Prometheus metrics for the resilience controller.
//!
//! One registry per process. Memory gauges are refreshed whenever memory is
//! sampled by the health monitor, inference latency is observed by the
//! adaptive gateway, and the retrieval document count by the RAG check.

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::memory::MemoryReading;

/// Latency buckets in seconds, from a cached hit to a cold 70B generation
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Errors raised while building or rendering the registry
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("metrics exposition is not valid UTF-8")]
    Encoding,
}

pub struct VigilMetrics {
    registry: Registry,
    memory_total_bytes: IntGauge,
    memory_used_bytes: IntGauge,
    memory_available_bytes: IntGauge,
    memory_percent: Gauge,
    inference_latency: HistogramVec,
    rag_documents: IntGauge,
}

impl VigilMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let memory_total_bytes = IntGauge::with_opts(Opts::new(
            "vigil_memory_total_bytes",
            "Total host memory in bytes",
        ))?;
        let memory_used_bytes = IntGauge::with_opts(Opts::new(
            "vigil_memory_used_bytes",
            "Host memory in use in bytes",
        ))?;
        let memory_available_bytes = IntGauge::with_opts(Opts::new(
            "vigil_memory_available_bytes",
            "Host memory available to new allocations in bytes",
        ))?;
        let memory_percent = Gauge::with_opts(Opts::new(
            "vigil_memory_used_percent",
            "Host memory usage percentage",
        ))?;
        let inference_latency = HistogramVec::new(
            HistogramOpts::new(
                "vigil_inference_latency_seconds",
                "Model generation latency by model and quantization tier",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["model", "quantization"],
        )?;
        let rag_documents = IntGauge::with_opts(Opts::new(
            "vigil_rag_documents",
            "Documents indexed by the retrieval subsystem",
        ))?;

        registry.register(Box::new(memory_total_bytes.clone()))?;
        registry.register(Box::new(memory_used_bytes.clone()))?;
        registry.register(Box::new(memory_available_bytes.clone()))?;
        registry.register(Box::new(memory_percent.clone()))?;
        registry.register(Box::new(inference_latency.clone()))?;
        registry.register(Box::new(rag_documents.clone()))?;

        Ok(Self {
            registry,
            memory_total_bytes,
            memory_used_bytes,
            memory_available_bytes,
            memory_percent,
            inference_latency,
            rag_documents,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_memory(&self, reading: &MemoryReading) {
        self.memory_total_bytes.set(saturating_i64(reading.total_bytes));
        self.memory_used_bytes.set(saturating_i64(reading.used_bytes));
        self.memory_available_bytes
            .set(saturating_i64(reading.available_bytes));
        self.memory_percent.set(reading.percent_used);
    }

    pub fn observe_inference(&self, model: &str, tier: &str, elapsed: Duration) {
        self.inference_latency
            .with_label_values(&[model, tier])
            .observe(elapsed.as_secs_f64());
    }

    /// Number of observations recorded for one model and tier
    pub fn inference_count(&self, model: &str, tier: &str) -> u64 {
        self.inference_latency
            .with_label_values(&[model, tier])
            .get_sample_count()
    }

    pub fn set_rag_documents(&self, count: usize) {
        self.rag_documents
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn rag_documents(&self) -> i64 {
        self.rag_documents.get()
    }

    pub fn memory_percent(&self) -> f64 {
        self.memory_percent.get()
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| MetricsError::Encoding)
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
