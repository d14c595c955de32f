//! Health monitor end to end: failure injection, recovery and shutdown

use std::sync::Arc;
use std::time::Duration;
use vigil_foundation::monitor::{Component, ComponentHealth};
use vigil_foundation::{
    CircuitBreaker, CircuitBreakerConfig, HealthMonitor, MemoryConfig, MemoryManager, MemoryProbe,
    ProtectedModelGateway, ProtectedRetrievalGateway, QuantizationLadder, ResponseCache, State,
    TierController,
};
use vigil_kernel::{GatewayError, GenerateOptions, ModelGateway};
use vigil_testing::{MockModelGateway, MockRetrievalGateway, ScriptedMemorySource};

fn breaker(name: &str) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        name: name.to_string(),
        ..CircuitBreakerConfig::strict()
    }))
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_monitor_survives_failures_and_recovers() {
    let model = MockModelGateway::new();
    let rag = MockRetrievalGateway::new();
    rag.add_document("handbook", 3);
    let memory = ScriptedMemorySource::fixed(40.0);
    let probe = MemoryProbe::new(Arc::new(memory.clone()), 90.0);

    let protected = Arc::new(ProtectedModelGateway::new(
        Arc::new(model.clone()),
        breaker("model"),
    ));
    let retrieval = Arc::new(ProtectedRetrievalGateway::new(
        Arc::new(rag.clone()),
        breaker("rag"),
    ));
    let monitor = HealthMonitor::builder(protected.clone(), probe)
        .retrieval(retrieval)
        .build();

    model.set_failing(GatewayError::ProcessFailed("runtime crashed".to_string()));
    rag.set_failure(Some(GatewayError::Transport("vector store closed".to_string())));

    monitor.start(Duration::from_secs(10));

    // Cycles at t=0, 10, 20; the third failure opens the model breaker
    tokio::time::sleep(Duration::from_secs(25)).await;
    settle().await;

    let snapshot = monitor.snapshot();
    assert!(snapshot.cycle >= 3);
    assert_eq!(snapshot.model, ComponentHealth::Unhealthy);
    assert_eq!(snapshot.memory, ComponentHealth::Healthy);
    assert_eq!(protected.breaker().state(), State::Open);
    assert!(model.reload_count() >= 1);

    // Reinitializing the store fixed retrieval on the following cycle
    assert!(rag.reinitialize_count() >= 1);
    assert_eq!(snapshot.rag, Some(ComponentHealth::Healthy));

    // Once the runtime is back, the breaker lets a trial probe through
    // after its recovery timeout and closes again
    model.recover();
    tokio::time::sleep(Duration::from_secs(40)).await;
    settle().await;

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.model, ComponentHealth::Healthy);
    assert_eq!(protected.breaker().state(), State::Closed);
    assert!(snapshot.is_healthy());

    monitor.stop().await;
    assert!(!monitor.is_running());
    let cycles = monitor.snapshot().cycle;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(monitor.snapshot().cycle, cycles);
}

#[tokio::test]
async fn test_panicking_model_probe_is_isolated() {
    let model = MockModelGateway::new();
    model.set_panic_on_generate(true);
    let rag = MockRetrievalGateway::new();
    let probe = MemoryProbe::new(Arc::new(ScriptedMemorySource::fixed(30.0)), 90.0);

    let protected = Arc::new(ProtectedModelGateway::new(
        Arc::new(model.clone()),
        breaker("model"),
    ));
    let monitor = HealthMonitor::builder(protected, probe)
        .retrieval(Arc::new(ProtectedRetrievalGateway::new(
            Arc::new(rag.clone()),
            breaker("rag"),
        )))
        .build();

    let snapshot = monitor.check_health().await;
    assert_eq!(snapshot.model, ComponentHealth::Unhealthy);
    assert_eq!(snapshot.memory, ComponentHealth::Healthy);
    assert_eq!(snapshot.rag, Some(ComponentHealth::Healthy));
    assert_eq!(rag.list_call_count(), 1);
    assert_eq!(snapshot.breakers.len(), 2);
}

#[tokio::test]
async fn test_memory_pressure_recovery_clears_cache_and_downgrades() {
    let model = MockModelGateway::new();
    let memory = ScriptedMemorySource::fixed(40.0);
    let probe = MemoryProbe::new(Arc::new(memory.clone()), 90.0);

    let cache = Arc::new(ResponseCache::new(16));
    let manager = Arc::new(
        MemoryManager::new(probe.clone(), MemoryConfig::default()).with_cache(cache.clone()),
    );
    let tiers = Arc::new(
        TierController::new(QuantizationLadder::default(), "q8_0")
            .with_switch(Arc::new(model.clone())),
    );
    let protected = Arc::new(
        ProtectedModelGateway::new(Arc::new(model.clone()), breaker("model"))
            .with_cache(cache.clone())
            .with_memory_manager(manager.clone()),
    );

    protected
        .generate("warm the cache", &GenerateOptions::new())
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    let monitor = HealthMonitor::builder(protected, probe)
        .memory_manager(manager)
        .tier_controller(tiers.clone())
        .build();

    memory.set(95.0);
    let snapshot = monitor.check_health().await;
    assert_eq!(snapshot.memory, ComponentHealth::Unhealthy);
    assert_eq!(snapshot.memory_percent.map(|p| p.round()), Some(95.0));

    for _ in 0..50 {
        if tiers.current().as_str() == "q4_0" && !monitor.is_recovering(Component::Memory) {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(tiers.current().as_str(), "q4_0");
    assert!(cache.is_empty());
    assert_eq!(
        model.applied_tiers().last().map(|t| t.as_str().to_string()),
        Some("q4_0".to_string())
    );
}

#[tokio::test]
async fn test_cached_health_prompt_cannot_mask_dead_runtime() {
    let model = MockModelGateway::new();
    let probe = MemoryProbe::new(Arc::new(ScriptedMemorySource::fixed(40.0)), 90.0);
    let cache = Arc::new(ResponseCache::new(16));
    let protected = Arc::new(
        ProtectedModelGateway::new(
            Arc::new(model.clone()),
            Arc::new(CircuitBreaker::new(
                CircuitBreakerConfig::new("model").with_failure_threshold(50),
            )),
        )
        .with_cache(cache.clone()),
    );
    let monitor = HealthMonitor::builder(protected.clone(), probe).build();

    // A user request for the same prompt leaves an answer in the cache
    let config = monitor.config().clone();
    let options = GenerateOptions::new().with_max_tokens(config.probe_max_tokens);
    protected.generate(&config.probe_prompt, &options).await.unwrap();
    assert_eq!(cache.len(), 1);

    assert!(monitor.check_health().await.is_healthy());

    model.set_failing(GatewayError::ProcessFailed("runtime crashed".to_string()));
    for _ in 0..4 {
        let snapshot = monitor.check_health().await;
        assert_eq!(snapshot.model, ComponentHealth::Unhealthy);
    }
    vigil_testing::assert_generate_calls!(model, 6);

    // User traffic still gets the cached answer
    assert!(protected.generate(&config.probe_prompt, &options).await.is_ok());
    vigil_testing::assert_generate_calls!(model, 6);
}
