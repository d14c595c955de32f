//! Recovery strategies run when a component is found unhealthy.
//!
//! Each strategy is attempted independently: an error or panic in one is
//! logged and the next strategy still runs. Nothing here returns an error to
//! the caller; the outcome is reported for logging and tests only.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use serde::Serialize;
use vigil_kernel::{GatewayError, GatewayResult, ModelGateway, RetrievalGateway};

use super::health::Component;
use crate::memory::{MemoryManager, MemoryProbe};
use crate::quantization::TierController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyOutcome {
    Succeeded,
    /// The collaborator lacks the capability
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub component: Component,
    pub strategies: Vec<(&'static str, StrategyOutcome)>,
}

impl RecoveryReport {
    fn new(component: Component) -> Self {
        Self {
            component,
            strategies: Vec::new(),
        }
    }

    pub fn outcome(&self, strategy: &str) -> Option<StrategyOutcome> {
        self.strategies
            .iter()
            .find(|(name, _)| *name == strategy)
            .map(|(_, outcome)| *outcome)
    }
}

async fn run_strategy<F>(report: &mut RecoveryReport, strategy: &'static str, fut: F)
where
    F: Future<Output = GatewayResult<()>>,
{
    let component = report.component;
    let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {
            tracing::info!(component = %component, strategy, "recovery strategy succeeded");
            StrategyOutcome::Succeeded
        }
        Ok(Err(GatewayError::Unsupported(_))) => {
            tracing::debug!(component = %component, strategy, "recovery strategy not supported");
            StrategyOutcome::Skipped
        }
        Ok(Err(e)) => {
            tracing::error!(component = %component, strategy, error = %e, "recovery strategy failed");
            StrategyOutcome::Failed
        }
        Err(_) => {
            tracing::error!(component = %component, strategy, "recovery strategy panicked");
            StrategyOutcome::Failed
        }
    };
    report.strategies.push((strategy, outcome));
}

fn unsupported(what: &str) -> GatewayError {
    GatewayError::Unsupported(what.to_string())
}

/// Reload the model, then let the ladder pick a tier for current memory.
///
/// Tier adaptation needs both a memory manager and a tier controller; without
/// either the strategy is reported as skipped and the tier is left alone.
pub async fn recover_model(
    model: &dyn ModelGateway,
    manager: Option<&MemoryManager>,
    tiers: Option<&TierController>,
) -> RecoveryReport {
    tracing::info!("attempting model recovery");
    let mut report = RecoveryReport::new(Component::Model);

    run_strategy(&mut report, "reload", async {
        match model.reloader() {
            Some(reloader) => reloader.reload().await,
            None => Err(unsupported("reload")),
        }
    })
    .await;

    run_strategy(&mut report, "adapt_tier", async {
        let manager = manager.ok_or_else(|| unsupported("memory manager"))?;
        let tiers = tiers.ok_or_else(|| unsupported("tier control"))?;
        let reading = manager.sample();
        tiers.adapt(Some(&reading), None).await.map(|_| ())
    })
    .await;

    report
}

/// Clear caches, relieve memory pressure and force a lighter tier.
pub async fn recover_memory(
    model: &dyn ModelGateway,
    manager: Option<&MemoryManager>,
    tiers: Option<&TierController>,
    probe: &MemoryProbe,
) -> RecoveryReport {
    tracing::info!("attempting memory recovery");
    let mut report = RecoveryReport::new(Component::Memory);

    run_strategy(&mut report, "clear_cache", async {
        let control = model
            .cache_control()
            .ok_or_else(|| unsupported("cache control"))?;
        control.clear_cache().await.map(|_| ())
    })
    .await;

    run_strategy(&mut report, "reduce_pressure", async {
        let manager = manager.ok_or_else(|| unsupported("memory manager"))?;
        manager.reduce_memory_pressure();
        Ok(())
    })
    .await;

    run_strategy(&mut report, "downgrade_tier", async {
        let tiers = tiers.ok_or_else(|| unsupported("tier control"))?;
        let reading = probe.sample();
        tiers.force_downgrade(Some(&reading)).await.map(|_| ())
    })
    .await;

    report
}

/// Reinitialize the vector store, then reconnect to it.
pub async fn recover_rag(rag: &dyn RetrievalGateway) -> RecoveryReport {
    tracing::info!("attempting RAG recovery");
    let mut report = RecoveryReport::new(Component::Rag);

    run_strategy(&mut report, "reinitialize", async {
        match rag.store_control() {
            Some(store) => store.reinitialize().await,
            None => Err(unsupported("vector store control")),
        }
    })
    .await;

    run_strategy(&mut report, "reconnect", async {
        match rag.store_control() {
            Some(store) => store.reconnect().await,
            None => Err(unsupported("vector store control")),
        }
    })
    .await;

    report
}

// ============================================================================
// In-flight tracking
// ============================================================================

/// At most one recovery per component runs at a time.
#[derive(Debug, Default)]
pub(crate) struct RecoveryTracker {
    model: AtomicBool,
    memory: AtomicBool,
    rag: AtomicBool,
}

impl RecoveryTracker {
    fn flag(&self, component: Component) -> &AtomicBool {
        match component {
            Component::Model => &self.model,
            Component::Memory => &self.memory,
            Component::Rag => &self.rag,
        }
    }

    pub(crate) fn is_running(&self, component: Component) -> bool {
        self.flag(component).load(Ordering::SeqCst)
    }

    /// Claim the component's slot; `None` if a recovery is already running.
    pub(crate) fn try_begin(self: &Arc<Self>, component: Component) -> Option<RecoveryPermit> {
        self.flag(component)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RecoveryPermit {
                tracker: Arc::clone(self),
                component,
            })
    }
}

/// Releases the component's slot when dropped, including on panic or abort.
pub(crate) struct RecoveryPermit {
    tracker: Arc<RecoveryTracker>,
    component: Component,
}

impl Drop for RecoveryPermit {
    fn drop(&mut self) {
        self.tracker.flag(self.component).store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConfig, MemoryError, MemorySource, RawMemory};
    use crate::quantization::QuantizationLadder;
    use async_trait::async_trait;
    use vigil_kernel::{
        DocumentInfo, GenerateOptions, ModelReload, Passage, VectorStoreControl,
    };

    struct Hot;

    impl MemorySource for Hot {
        fn read(&self) -> Result<RawMemory, MemoryError> {
            Ok(RawMemory {
                total: 100,
                used: 95,
                available: 5,
                free: 5,
            })
        }
    }

    struct PanickingReload;

    #[async_trait]
    impl ModelReload for PanickingReload {
        async fn reload(&self) -> GatewayResult<()> {
            panic!("reload exploded");
        }
    }

    struct Model {
        reload: PanickingReload,
    }

    #[async_trait]
    impl ModelGateway for Model {
        fn name(&self) -> &str {
            "model"
        }

        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> GatewayResult<String> {
            Err(GatewayError::ProcessFailed("runtime crashed".into()))
        }

        fn reloader(&self) -> Option<&dyn ModelReload> {
            Some(&self.reload)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStoreControl for FailingStore {
        async fn reinitialize(&self) -> GatewayResult<()> {
            Err(GatewayError::Other("index corrupt".into()))
        }
    }

    struct Rag {
        store: FailingStore,
    }

    #[async_trait]
    impl RetrievalGateway for Rag {
        fn name(&self) -> &str {
            "rag"
        }

        async fn list_documents(&self) -> GatewayResult<Vec<DocumentInfo>> {
            Ok(Vec::new())
        }

        async fn query(&self, _text: &str, _top_k: usize) -> GatewayResult<Vec<Passage>> {
            Ok(Vec::new())
        }

        fn store_control(&self) -> Option<&dyn VectorStoreControl> {
            Some(&self.store)
        }
    }

    fn hot_probe() -> MemoryProbe {
        MemoryProbe::new(Arc::new(Hot), 90.0)
    }

    #[tokio::test]
    async fn test_panicking_strategy_does_not_stop_the_next() {
        let model = Model {
            reload: PanickingReload,
        };
        let tiers = TierController::new(QuantizationLadder::default(), "q8_0");

        let manager = MemoryManager::new(hot_probe(), MemoryConfig::default());

        let report = recover_model(&model, Some(&manager), Some(&tiers)).await;
        assert_eq!(report.outcome("reload"), Some(StrategyOutcome::Failed));
        assert_eq!(report.outcome("adapt_tier"), Some(StrategyOutcome::Succeeded));
        assert_eq!(tiers.current().as_str(), "q4_0");
    }

    #[tokio::test]
    async fn test_model_recovery_leaves_tier_without_memory_manager() {
        let model = Model {
            reload: PanickingReload,
        };
        let tiers = TierController::new(QuantizationLadder::default(), "q8_0");

        let report = recover_model(&model, None, Some(&tiers)).await;
        assert_eq!(report.outcome("adapt_tier"), Some(StrategyOutcome::Skipped));
        assert_eq!(tiers.current().as_str(), "q8_0");
    }

    #[tokio::test]
    async fn test_memory_recovery_skips_missing_capabilities() {
        let model = Model {
            reload: PanickingReload,
        };
        let tiers = TierController::new(QuantizationLadder::default(), "q5_k_m");

        let report = recover_memory(&model, None, Some(&tiers), &hot_probe()).await;
        assert_eq!(report.outcome("clear_cache"), Some(StrategyOutcome::Skipped));
        assert_eq!(report.outcome("reduce_pressure"), Some(StrategyOutcome::Skipped));
        assert_eq!(report.outcome("downgrade_tier"), Some(StrategyOutcome::Succeeded));
        assert_eq!(tiers.current().as_str(), "q4_0");
    }

    #[tokio::test]
    async fn test_rag_recovery_tries_reconnect_after_failed_reinitialize() {
        let rag = Rag {
            store: FailingStore,
        };
        let report = recover_rag(&rag).await;
        assert_eq!(report.outcome("reinitialize"), Some(StrategyOutcome::Failed));
        // Default reconnect reports unsupported.
        assert_eq!(report.outcome("reconnect"), Some(StrategyOutcome::Skipped));
    }

    #[test]
    fn test_tracker_allows_one_recovery_per_component() {
        let tracker = Arc::new(RecoveryTracker::default());
        let permit = tracker.try_begin(Component::Model).unwrap();
        assert!(tracker.try_begin(Component::Model).is_none());
        assert!(tracker.try_begin(Component::Rag).is_some());

        drop(permit);
        assert!(!tracker.is_running(Component::Model));
        assert!(tracker.try_begin(Component::Model).is_some());
    }
}
