use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use vigil_kernel::{
    CacheControl, GatewayError, GatewayResult, GenerateOptions, ModelGateway, ModelReload,
    QuantizationTier, TierSwitch,
};

/// One recorded `generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub prompt: String,
    pub options: GenerateOptions,
}

#[derive(Default)]
struct Script {
    /// Maps a prompt substring to a response
    responses: HashMap<String, String>,
    /// Errors returned by the next calls, in order
    queued_failures: VecDeque<GatewayError>,
    /// Error returned by every call once the queue is drained
    persistent_failure: Option<GatewayError>,
    latency: Option<Duration>,
    reload_failure: Option<GatewayError>,
    history: Vec<GenerateCall>,
    applied_tiers: Vec<QuantizationTier>,
}

/// A mock model runtime implementing every model-side capability.
///
/// Clones share state, so a test can hand one clone to the controller and
/// script or inspect the other.
#[derive(Clone)]
pub struct MockModelGateway {
    name: String,
    fallback_response: String,
    script: Arc<RwLock<Script>>,
    panic_on_generate: Arc<AtomicBool>,
    reloads: Arc<AtomicUsize>,
    cache_clears: Arc<AtomicUsize>,
}

impl Default for MockModelGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModelGateway {
    pub fn new() -> Self {
        Self {
            name: "mock-model".to_string(),
            fallback_response: "This is a fallback mock response.".to_string(),
            script: Arc::new(RwLock::new(Script::default())),
            panic_on_generate: Arc::new(AtomicBool::new(false)),
            reloads: Arc::new(AtomicUsize::new(0)),
            cache_clears: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer prompts containing `prompt_key` with `response`.
    pub fn add_mock_response(&self, prompt_key: &str, response: &str) {
        self.script
            .write()
            .responses
            .insert(prompt_key.to_string(), response.to_string());
    }

    /// Fail the next `count` calls with a transport error.
    pub fn fail_next(&self, count: usize) {
        let mut script = self.script.write();
        for _ in 0..count {
            script
                .queued_failures
                .push_back(GatewayError::Transport("connection refused".to_string()));
        }
    }

    /// Fail the next call with `error`.
    pub fn fail_next_with(&self, error: GatewayError) {
        self.script.write().queued_failures.push_back(error);
    }

    /// Fail every call until [`MockModelGateway::recover`] is called.
    pub fn set_failing(&self, error: GatewayError) {
        self.script.write().persistent_failure = Some(error);
    }

    /// Clear all scripted failures.
    pub fn recover(&self) {
        let mut script = self.script.write();
        script.queued_failures.clear();
        script.persistent_failure = None;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.script.write().latency = latency;
    }

    pub fn set_panic_on_generate(&self, panic: bool) {
        self.panic_on_generate.store(panic, Ordering::SeqCst);
    }

    pub fn set_reload_failure(&self, error: Option<GatewayError>) {
        self.script.write().reload_failure = error;
    }

    pub fn history(&self) -> Vec<GenerateCall> {
        self.script.read().history.clone()
    }

    /// Number of calls that reached the model, failed or not.
    pub fn call_count(&self) -> usize {
        self.script.read().history.len()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn cache_clear_count(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }

    /// Tiers pushed through [`TierSwitch`], oldest first.
    pub fn applied_tiers(&self) -> Vec<QuantizationTier> {
        self.script.read().applied_tiers.clone()
    }

    /// Record the call and decide its outcome without holding the lock
    /// across the simulated latency.
    fn begin_call(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> (Option<Duration>, GatewayResult<String>) {
        let mut script = self.script.write();
        script.history.push(GenerateCall {
            prompt: prompt.to_string(),
            options: options.clone(),
        });

        let outcome = if let Some(error) = script.queued_failures.pop_front() {
            Err(error)
        } else if let Some(error) = &script.persistent_failure {
            Err(error.clone())
        } else {
            let response = script
                .responses
                .iter()
                .find(|(key, _)| prompt.contains(key.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| self.fallback_response.clone());
            Ok(response)
        };
        (script.latency, outcome)
    }
}

#[async_trait]
impl ModelGateway for MockModelGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> GatewayResult<String> {
        if self.panic_on_generate.load(Ordering::SeqCst) {
            panic!("mock model panicked on generate");
        }
        let (latency, outcome) = self.begin_call(prompt, options);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }

    fn reloader(&self) -> Option<&dyn ModelReload> {
        Some(self)
    }

    fn cache_control(&self) -> Option<&dyn CacheControl> {
        Some(self)
    }
}

#[async_trait]
impl ModelReload for MockModelGateway {
    async fn reload(&self) -> GatewayResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        match self.script.read().reload_failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CacheControl for MockModelGateway {
    async fn clear_cache(&self) -> GatewayResult<usize> {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

#[async_trait]
impl TierSwitch for MockModelGateway {
    async fn apply_tier(&self, tier: &QuantizationTier) -> GatewayResult<()> {
        tracing::debug!(tier = %tier, "mock model switching tier");
        self.script.write().applied_tiers.push(tier.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_and_failures() {
        let model = MockModelGateway::new();
        model.add_mock_response("weather", "sunny");
        model.fail_next(1);

        let options = GenerateOptions::new();
        assert!(model.generate("weather today?", &options).await.is_err());
        assert_eq!(model.generate("weather today?", &options).await.unwrap(), "sunny");
        assert_eq!(
            model.generate("anything else", &options).await.unwrap(),
            "This is a fallback mock response."
        );
        crate::assert_generate_calls!(model, 3);
    }

    #[tokio::test]
    async fn test_persistent_failure_until_recovered() {
        let model = MockModelGateway::new();
        model.set_failing(GatewayError::ProcessFailed("oom".to_string()));
        let options = GenerateOptions::new();

        assert!(model.generate("a", &options).await.is_err());
        assert!(model.generate("b", &options).await.is_err());
        model.recover();
        assert!(model.generate("c", &options).await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let model = MockModelGateway::new();
        let handle = model.clone();
        handle.apply_tier(&QuantizationTier::from("q8_0")).await.unwrap();
        handle.reload().await.unwrap();

        assert_eq!(model.applied_tiers(), vec![QuantizationTier::from("q8_0")]);
        assert_eq!(model.reload_count(), 1);
    }
}
