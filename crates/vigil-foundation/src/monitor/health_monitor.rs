//! Background health monitor.
//!
//! Every cycle probes the model with a tiny generation, samples memory and,
//! when configured, lists retrieval documents. Results are published as an
//! immutable [`HealthSnapshot`]; unhealthy components get a recovery attempt
//! spawned in the background.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_kernel::{GenerateOptions, RetrievalGateway};

use super::config::MonitorConfig;
use super::health::{Component, ComponentHealth, HealthSnapshot};
use super::recovery::{self, RecoveryReport, RecoveryTracker};
use crate::gateway::{ProtectedModelGateway, ProtectedRetrievalGateway};
use crate::memory::{DetailedMemoryReport, MemoryManager, MemoryProbe};
use crate::metrics::VigilMetrics;
use crate::quantization::TierController;

struct MonitorInner {
    config: MonitorConfig,
    model: Arc<ProtectedModelGateway>,
    rag: Option<Arc<ProtectedRetrievalGateway>>,
    probe: MemoryProbe,
    memory_manager: Option<Arc<MemoryManager>>,
    tiers: Option<Arc<TierController>>,
    metrics: Option<Arc<VigilMetrics>>,
    snapshot: RwLock<Arc<HealthSnapshot>>,
    cycles: AtomicU64,
    recoveries: Arc<RecoveryTracker>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Periodic health checks with automatic recovery.
///
/// Cheap to clone; all clones share the same state and background task.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

/// Builder for [`HealthMonitor`]
pub struct HealthMonitorBuilder {
    config: MonitorConfig,
    model: Arc<ProtectedModelGateway>,
    rag: Option<Arc<ProtectedRetrievalGateway>>,
    probe: MemoryProbe,
    memory_manager: Option<Arc<MemoryManager>>,
    tiers: Option<Arc<TierController>>,
    metrics: Option<Arc<VigilMetrics>>,
}

impl HealthMonitorBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retrieval(mut self, rag: Arc<ProtectedRetrievalGateway>) -> Self {
        self.rag = Some(rag);
        self
    }

    pub fn memory_manager(mut self, manager: Arc<MemoryManager>) -> Self {
        self.memory_manager = Some(manager);
        self
    }

    pub fn tier_controller(mut self, tiers: Arc<TierController>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    /// Publish memory gauges and the retrieval document count each cycle.
    pub fn metrics(mut self, metrics: Arc<VigilMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> HealthMonitor {
        let snapshot = HealthSnapshot::initial(self.rag.is_some());
        info!(rag = self.rag.is_some(), "health monitor initialized");
        HealthMonitor {
            inner: Arc::new(MonitorInner {
                config: self.config.validated(),
                model: self.model,
                rag: self.rag,
                probe: self.probe,
                memory_manager: self.memory_manager,
                tiers: self.tiers,
                metrics: self.metrics,
                snapshot: RwLock::new(Arc::new(snapshot)),
                cycles: AtomicU64::new(0),
                recoveries: Arc::new(RecoveryTracker::default()),
                task: Mutex::new(None),
            }),
        }
    }
}

impl HealthMonitor {
    pub fn builder(model: Arc<ProtectedModelGateway>, probe: MemoryProbe) -> HealthMonitorBuilder {
        HealthMonitorBuilder {
            config: MonitorConfig::default(),
            model,
            rag: None,
            probe,
            memory_manager: None,
            tiers: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// The breaker-protected model gateway being probed
    pub fn model(&self) -> &Arc<ProtectedModelGateway> {
        &self.inner.model
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.inner.snapshot.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.task.lock().is_some()
    }

    /// Whether a recovery for `component` is currently in flight
    pub fn is_recovering(&self, component: Component) -> bool {
        self.inner.recoveries.is_running(component)
    }

    /// Start the background loop. The first cycle runs immediately.
    pub fn start(&self, interval: Duration) {
        let mut task = self.inner.task.lock();
        if task.is_some() {
            warn!("health monitor is already running");
            return;
        }

        let interval = if interval.is_zero() {
            warn!("monitor interval must be > 0, using configured interval");
            self.inner.config.interval
        } else {
            interval
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = monitor.check_health().await;
                        if !snapshot.is_healthy() {
                            warn!(cycle = snapshot.cycle, "health check found unhealthy components");
                        }
                    }
                }
            }
            debug!("health monitor loop exited");
        });

        *task = Some((token, handle));
        info!(interval = ?interval, "health monitoring started");
    }

    /// Stop the background loop, waiting at most the configured shutdown
    /// timeout for the in-progress cycle to finish.
    pub async fn stop(&self) {
        let Some((token, mut handle)) = self.inner.task.lock().take() else {
            return;
        };
        token.cancel();

        match tokio::time::timeout(self.inner.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => info!("health monitoring stopped"),
            Ok(Err(e)) => error!(error = %e, "health monitor task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout = ?self.inner.config.shutdown_timeout,
                    "health monitor did not stop in time, aborting"
                );
                handle.abort();
            }
        }
    }

    /// Run one check cycle and publish the result.
    ///
    /// The three component checks run as separate tasks, so a probe that
    /// hangs or panics never prevents the others from reporting.
    pub async fn check_health(&self) -> Arc<HealthSnapshot> {
        let inner = &self.inner;

        let model = tokio::spawn(Arc::clone(inner).check_model());
        let memory = tokio::spawn(Arc::clone(inner).check_memory());
        let rag = inner
            .rag
            .as_ref()
            .map(|_| tokio::spawn(Arc::clone(inner).check_rag()));

        let model_health = match model.await {
            Ok(health) => health,
            Err(e) => {
                error!(component = %Component::Model, error = %e, "health probe panicked");
                ComponentHealth::Unhealthy
            }
        };
        let (memory_health, report) = match memory.await {
            Ok((health, report)) => (health, Some(report)),
            Err(e) => {
                error!(component = %Component::Memory, error = %e, "health probe panicked");
                (ComponentHealth::Unhealthy, None)
            }
        };
        let rag_health = match rag {
            Some(handle) => Some(handle.await.unwrap_or_else(|e| {
                error!(component = %Component::Rag, error = %e, "health probe panicked");
                ComponentHealth::Unhealthy
            })),
            None => None,
        };

        let mut breakers = vec![inner.model.breaker_snapshot()];
        if let Some(rag) = &inner.rag {
            breakers.push(rag.breaker().snapshot());
        }

        let cycle = inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(HealthSnapshot {
            checked_at: Some(Utc::now()),
            cycle,
            model: model_health,
            memory: memory_health,
            rag: rag_health,
            memory_percent: report.as_ref().map(|r| r.current.percent_used),
            memory_trend: report.as_ref().map(|r| r.trend_label),
            current_tier: inner.tiers.as_ref().map(|t| t.current()),
            breakers,
        });
        *inner.snapshot.write() = Arc::clone(&snapshot);
        debug!(cycle, healthy = snapshot.is_healthy(), "health check cycle complete");
        snapshot
    }
}

impl MonitorInner {
    async fn check_model(self: Arc<Self>) -> ComponentHealth {
        let options = GenerateOptions::new().with_max_tokens(self.config.probe_max_tokens);
        // A cached answer says nothing about whether the runtime is alive.
        let probe = self.model.generate_uncached(&self.config.probe_prompt, &options);

        let failure = match tokio::time::timeout(self.config.probe_timeout, probe).await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => {
                // The breaker never saw the call finish; count it here.
                self.model.breaker().record_failure();
                Some(format!("probe timed out after {:?}", self.config.probe_timeout))
            }
        };

        match failure {
            None => ComponentHealth::Healthy,
            Some(reason) => {
                warn!(component = %Component::Model, reason = %reason, "model health check failed");
                let this = Arc::clone(&self);
                self.spawn_recovery(Component::Model, async move {
                    recovery::recover_model(
                        this.model.as_ref(),
                        this.memory_manager.as_deref(),
                        this.tiers.as_deref(),
                    )
                    .await
                });
                ComponentHealth::Unhealthy
            }
        }
    }

    async fn check_memory(self: Arc<Self>) -> (ComponentHealth, DetailedMemoryReport) {
        let report = self.probe.detailed_sample();
        let percent = report.current.percent_used;
        if let Some(metrics) = &self.metrics {
            metrics.record_memory(&report.current);
        }

        if percent > self.config.memory_unhealthy_percent {
            warn!(
                component = %Component::Memory,
                percent,
                trend = %report.trend_label,
                "critical memory pressure"
            );
            let this = Arc::clone(&self);
            self.spawn_recovery(Component::Memory, async move {
                recovery::recover_memory(
                    this.model.as_ref(),
                    this.memory_manager.as_deref(),
                    this.tiers.as_deref(),
                    &this.probe,
                )
                .await
            });
            (ComponentHealth::Unhealthy, report)
        } else {
            (ComponentHealth::Healthy, report)
        }
    }

    async fn check_rag(self: Arc<Self>) -> ComponentHealth {
        let Some(rag) = self.rag.clone() else {
            return ComponentHealth::Healthy;
        };

        let failure = match tokio::time::timeout(self.config.probe_timeout, rag.list_documents()).await
        {
            Ok(Ok(documents)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.set_rag_documents(documents.len());
                }
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => {
                rag.breaker().record_failure();
                Some(format!("probe timed out after {:?}", self.config.probe_timeout))
            }
        };

        match failure {
            None => ComponentHealth::Healthy,
            Some(reason) => {
                warn!(component = %Component::Rag, reason = %reason, "RAG health check failed");
                self.spawn_recovery(Component::Rag, async move {
                    recovery::recover_rag(rag.as_ref() as &dyn RetrievalGateway).await
                });
                ComponentHealth::Unhealthy
            }
        }
    }

    /// Fire-and-forget recovery, bounded by the recovery timeout. Skipped
    /// when one is already running for the component.
    fn spawn_recovery<F>(&self, component: Component, recovery: F)
    where
        F: Future<Output = RecoveryReport> + Send + 'static,
    {
        let Some(permit) = self.recoveries.try_begin(component) else {
            debug!(component = %component, "recovery already in progress");
            return;
        };

        let limit = self.config.recovery_timeout;
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(limit, recovery).await {
                Ok(report) => info!(
                    component = %component,
                    strategies = ?report.strategies,
                    "recovery attempted"
                ),
                Err(_) => error!(component = %component, timeout = ?limit, "recovery timed out"),
            }
        });
    }
}
