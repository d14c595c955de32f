//! Ollama HTTP gateway
//!
//! Implements [`ModelGateway`] against `POST /api/generate`, plus the
//! [`ModelReload`] and [`TierSwitch`] capabilities so the health monitor and
//! tier controller can act on the running model.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use vigil_kernel::{
    GatewayError, GatewayResult, GenerateOptions, ModelGateway, ModelReload, QuantizationTier,
    TierSwitch,
};

use crate::config::OllamaConfig;

/// Pulling a model can take a long time on a slow link.
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    num_ctx: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u64>,
    eval_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// `<base>:<tier>` for a model name like `llama3:latest`.
pub fn tagged_model_name(model_name: &str, tier: &QuantizationTier) -> String {
    let base = model_name.split(':').next().unwrap_or(model_name);
    format!("{base}:{tier}")
}

/// Gateway to a local Ollama server.
pub struct OllamaGateway {
    client: reqwest::Client,
    config: OllamaConfig,
    /// Tag used when a call does not request a tier
    active_model: RwLock<String>,
}

impl OllamaGateway {
    pub fn new(config: OllamaConfig) -> GatewayResult<Self> {
        let config = config.validated();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Other(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            base_url = %config.base_url,
            model = %config.model_name,
            quantization = %config.quantization,
            "Ollama gateway initialized"
        );

        Ok(Self {
            client,
            active_model: RwLock::new(config.model_name.clone()),
            config,
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Model tag currently used for untiered requests
    pub fn active_model(&self) -> String {
        self.active_model.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else if err.is_decode() {
            GatewayError::MalformedResponse(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    async fn check_status(resp: reqwest::Response) -> GatewayResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn model_for(&self, options: &GenerateOptions) -> String {
        match &options.tier {
            Some(tier) => tagged_model_name(&self.active_model(), tier),
            None => self.active_model(),
        }
    }

    /// Names of locally installed models (`GET /api/tags`).
    pub async fn list_models(&self) -> GatewayResult<Vec<String>> {
        let resp = self
            .client
            .get(self.url("tags"))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let tags: TagsResponse = Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the active model is installed.
    pub async fn check_availability(&self) -> GatewayResult<bool> {
        let active = self.active_model();
        let available = self.list_models().await?.iter().any(|m| *m == active);
        if !available {
            tracing::warn!(model = %active, "model not found in Ollama, pull it before use");
        }
        Ok(available)
    }

    /// Download a model tag (`POST /api/pull`).
    pub async fn pull(&self, model: &str) -> GatewayResult<()> {
        tracing::info!(model, "pulling model, this may take a while");
        let resp = self
            .client
            .post(self.url("pull"))
            .timeout(PULL_TIMEOUT)
            .json(&PullRequest {
                model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        Self::check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String> {
        let model = self.model_for(options);
        let request = GenerateRequest {
            model: &model,
            prompt,
            stream: false,
            system: options.system_prompt.as_deref(),
            options: SamplingOptions {
                temperature: options.temperature.unwrap_or(self.config.temperature),
                top_p: options.top_p.unwrap_or(self.config.top_p),
                num_ctx: self.config.context_length,
                num_predict: options.max_tokens.or(self.config.max_tokens),
            },
        };

        tracing::debug!(model = %model, prompt_chars = prompt.chars().count(), "generating");
        let resp = self
            .client
            .post(self.url("generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let text = Self::check_status(resp)
            .await?
            .text()
            .await
            .map_err(|e| self.map_error(e))?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if let Some(eval_count) = parsed.eval_count {
            tracing::debug!(
                eval_count,
                eval_duration_ns = parsed.eval_duration.unwrap_or(0),
                "generation finished"
            );
        }
        Ok(parsed.response)
    }

    fn reloader(&self) -> Option<&dyn ModelReload> {
        Some(self)
    }
}

#[async_trait]
impl ModelReload for OllamaGateway {
    /// Load the model into memory by running a trivial generation.
    async fn reload(&self) -> GatewayResult<()> {
        let model = self.active_model();
        tracing::info!(model = %model, "loading model");
        let options = GenerateOptions::new()
            .with_system_prompt("Test")
            .with_max_tokens(1);
        self.generate("Hello", &options).await?;
        tracing::info!(model = %model, "model loaded");
        Ok(())
    }
}

#[async_trait]
impl TierSwitch for OllamaGateway {
    async fn apply_tier(&self, tier: &QuantizationTier) -> GatewayResult<()> {
        let current = self.active_model();
        let target = tagged_model_name(&current, tier);
        if target == current {
            return Ok(());
        }

        let installed = self.list_models().await?;
        if installed.iter().any(|m| *m == target) {
            tracing::info!(model = %target, "using installed model for tier");
        } else {
            self.pull(&target).await?;
        }

        *self.active_model.write() = target;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_gateway() -> OllamaGateway {
        // Port 9 (discard) on localhost is essentially never an HTTP server.
        let config = OllamaConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout_secs(2)
            .unwrap();
        OllamaGateway::new(config).unwrap()
    }

    #[test]
    fn test_tagged_model_name() {
        let tier = QuantizationTier::from("q8_0");
        assert_eq!(tagged_model_name("llama3:latest", &tier), "llama3:q8_0");
        assert_eq!(tagged_model_name("mistral", &tier), "mistral:q8_0");
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: "llama3:q4_0",
            prompt: "Hello",
            stream: false,
            system: None,
            options: SamplingOptions {
                temperature: 0.7,
                top_p: 0.9,
                num_ctx: 4096,
                num_predict: Some(5),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
        assert_eq!(json["options"]["num_ctx"], 4096);
        assert_eq!(json["options"]["num_predict"], 5);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_metrics() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"response": "Hi"}"#).unwrap();
        assert_eq!(parsed.response, "Hi");
        assert!(parsed.eval_count.is_none());
    }

    #[test]
    fn test_model_for_uses_requested_tier() {
        let gateway = unreachable_gateway();
        assert_eq!(gateway.model_for(&GenerateOptions::new()), "llama3:latest");
        assert_eq!(
            gateway.model_for(&GenerateOptions::new().with_tier("q5_k_m")),
            "llama3:q5_k_m"
        );
        assert_eq!(gateway.url("generate"), "http://127.0.0.1:9/api/generate");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient_failure() {
        let gateway = unreachable_gateway();
        let err = gateway
            .generate("Hello", &GenerateOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(!err.is_circuit_open());
        assert!(gateway.reloader().is_some());
    }
}
