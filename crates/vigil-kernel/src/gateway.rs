//! Gateway contracts
//!
//! The resilience core never talks to the model runtime or the vector store
//! directly. It depends on these traits:
//!
//! - [`ModelGateway`]: text generation against the local model runtime
//! - [`RetrievalGateway`]: document listing and top-k passage retrieval
//!
//! Optional maintenance operations are exposed as capability interfaces.
//! A gateway that supports reloading returns `Some` from
//! [`ModelGateway::reloader`]; one that does not keeps the default `None`.
//! Callers check presence and never probe for methods at runtime.

use crate::error::GatewayResult;
use crate::tier::QuantizationTier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Model gateway
// ============================================================================

/// Per-call generation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Quantization tier requested for this call
    pub tier: Option<QuantizationTier>,
    /// System prompt prepended by the runtime
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: impl Into<QuantizationTier>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Text generation against the model runtime
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Descriptive name used in logs
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String>;

    /// Reload capability, if the runtime supports it
    fn reloader(&self) -> Option<&dyn ModelReload> {
        None
    }

    /// Response-cache capability, if the gateway keeps one
    fn cache_control(&self) -> Option<&dyn CacheControl> {
        None
    }
}

/// Reload the model into runtime memory
#[async_trait]
pub trait ModelReload: Send + Sync {
    async fn reload(&self) -> GatewayResult<()>;
}

/// Drop cached responses to release memory
#[async_trait]
pub trait CacheControl: Send + Sync {
    /// Clear the cache, returning the number of evicted entries
    async fn clear_cache(&self) -> GatewayResult<usize>;
}

/// Switch the live model configuration to another quantization tier
#[async_trait]
pub trait TierSwitch: Send + Sync {
    async fn apply_tier(&self, tier: &QuantizationTier) -> GatewayResult<()>;
}

// ============================================================================
// Retrieval gateway
// ============================================================================

/// A document known to the retrieval subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub source: Option<String>,
    pub chunk_count: usize,
}

/// A retrieved passage with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

/// Document listing and passage retrieval
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn list_documents(&self) -> GatewayResult<Vec<DocumentInfo>>;

    async fn query(&self, text: &str, top_k: usize) -> GatewayResult<Vec<Passage>>;

    /// Vector-store maintenance capability, if supported
    fn store_control(&self) -> Option<&dyn VectorStoreControl> {
        None
    }
}

/// Maintenance operations on the vector store connection
#[async_trait]
pub trait VectorStoreControl: Send + Sync {
    /// Rebuild the in-process handle to the vector store
    async fn reinitialize(&self) -> GatewayResult<()>;

    /// Re-open the database connection
    async fn reconnect(&self) -> GatewayResult<()> {
        Err(crate::GatewayError::Unsupported("reconnect".into()))
    }
}
