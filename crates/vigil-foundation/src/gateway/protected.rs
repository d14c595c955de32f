//! Gateways wrapped in a circuit breaker.
//!
//! A protected gateway implements the same trait as the gateway it wraps, so
//! callers cannot tell the difference until the breaker opens and calls
//! start failing fast with [`GatewayError::CircuitOpen`].

use std::sync::Arc;

use async_trait::async_trait;
use vigil_kernel::{
    CacheControl, DocumentInfo, GatewayError, GatewayResult, GenerateOptions, ModelGateway,
    ModelReload, Passage, RetrievalGateway, VectorStoreControl,
};

use crate::cache::ResponseCache;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot};
use crate::memory::MemoryManager;

impl From<CircuitBreakerError<GatewayError>> for GatewayError {
    fn from(err: CircuitBreakerError<GatewayError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen { name, .. } => GatewayError::CircuitOpen { name },
            CircuitBreakerError::Timeout { timeout, .. } => GatewayError::Timeout(timeout),
            CircuitBreakerError::Operation(e) => e,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Model gateway guarded by a circuit breaker, with an optional response
/// cache in front of it.
pub struct ProtectedModelGateway {
    inner: Arc<dyn ModelGateway>,
    breaker: Arc<CircuitBreaker>,
    cache: Option<Arc<ResponseCache>>,
    memory: Option<Arc<MemoryManager>>,
}

impl ProtectedModelGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            breaker,
            cache: None,
            memory: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skip cache inserts while the manager reports memory pressure.
    pub fn with_memory_manager(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn breaker_snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Generate through the breaker only, bypassing the response cache in
    /// both directions. The health monitor uses this so a warm cache cannot
    /// hide a dead model.
    pub async fn generate_uncached(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> GatewayResult<String> {
        let response = self
            .breaker
            .call_classified(
                || self.inner.generate(prompt, options),
                GatewayError::is_transient,
            )
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ModelGateway for ProtectedModelGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(prompt, options)) {
            tracing::debug!(gateway = %self.inner.name(), "response cache hit");
            return Ok(hit);
        }

        let response = self.generate_uncached(prompt, options).await?;

        if let Some(cache) = &self.cache {
            let admit = self.memory.as_ref().is_none_or(|m| m.should_cache());
            if admit {
                cache.insert(prompt, options, response.clone());
            } else {
                tracing::debug!("memory pressure, response not cached");
            }
        }
        Ok(response)
    }

    fn reloader(&self) -> Option<&dyn ModelReload> {
        self.inner.reloader()
    }

    fn cache_control(&self) -> Option<&dyn CacheControl> {
        match &self.cache {
            Some(cache) => Some(cache.as_ref() as &dyn CacheControl),
            None => self.inner.cache_control(),
        }
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// Retrieval gateway guarded by a circuit breaker.
pub struct ProtectedRetrievalGateway {
    inner: Arc<dyn RetrievalGateway>,
    breaker: Arc<CircuitBreaker>,
}

impl ProtectedRetrievalGateway {
    pub fn new(inner: Arc<dyn RetrievalGateway>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl RetrievalGateway for ProtectedRetrievalGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_documents(&self) -> GatewayResult<Vec<DocumentInfo>> {
        Ok(self
            .breaker
            .call_classified(|| self.inner.list_documents(), GatewayError::is_transient)
            .await?)
    }

    async fn query(&self, text: &str, top_k: usize) -> GatewayResult<Vec<Passage>> {
        Ok(self
            .breaker
            .call_classified(|| self.inner.query(text, top_k), GatewayError::is_transient)
            .await?)
    }

    fn store_control(&self) -> Option<&dyn VectorStoreControl> {
        self.inner.store_control()
    }
}
