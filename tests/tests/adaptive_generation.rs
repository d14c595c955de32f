//! Tier adaptation in front of the protected gateway

use std::sync::Arc;
use vigil_foundation::{
    AdaptiveModelGateway, CircuitBreaker, MemoryProbe, ProtectedModelGateway, QuantizationLadder,
    TierController,
};
use vigil_kernel::{GenerateOptions, ModelGateway, QuantizationTier};
use vigil_testing::{MockModelGateway, ScriptedMemorySource};

struct Stack {
    model: MockModelGateway,
    memory: ScriptedMemorySource,
    tiers: Arc<TierController>,
    gateway: AdaptiveModelGateway,
}

fn stack(initial_tier: &str, memory_percent: f64) -> Stack {
    let model = MockModelGateway::new();
    let memory = ScriptedMemorySource::fixed(memory_percent);
    let probe = MemoryProbe::new(Arc::new(memory.clone()), 90.0);

    let tiers = Arc::new(
        TierController::new(QuantizationLadder::default(), initial_tier)
            .with_switch(Arc::new(model.clone())),
    );
    let protected = Arc::new(ProtectedModelGateway::new(
        Arc::new(model.clone()),
        Arc::new(CircuitBreaker::named("model")),
    ));
    let gateway = AdaptiveModelGateway::new(protected, tiers.clone()).with_probe(probe);

    Stack {
        model,
        memory,
        tiers,
        gateway,
    }
}

#[tokio::test]
async fn test_medium_pressure_steps_down_before_generating() {
    let stack = stack("q8_0", 80.0);

    stack
        .gateway
        .generate("summarize this", &GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(stack.tiers.current().as_str(), "q5_k_m");
    assert_eq!(
        stack.model.applied_tiers(),
        vec![QuantizationTier::from("q5_k_m")]
    );
    let call = &stack.model.history()[0];
    assert_eq!(call.options.tier, Some(QuantizationTier::from("q5_k_m")));
}

#[tokio::test]
async fn test_critical_pressure_forces_lowest_tier() {
    let stack = stack("f16", 40.0);
    stack.gateway.generate("hi", &GenerateOptions::new()).await.unwrap();
    assert_eq!(stack.tiers.current().as_str(), "f16");

    stack.memory.set(96.0);
    stack.gateway.generate("hi again", &GenerateOptions::new()).await.unwrap();
    assert_eq!(stack.tiers.current().as_str(), "q4_0");
}

#[tokio::test]
async fn test_explicit_tier_bypasses_adaptation() {
    let stack = stack("q8_0", 95.0);
    let options = GenerateOptions::new().with_tier("f16");

    stack.gateway.generate("hi", &options).await.unwrap();

    assert_eq!(stack.tiers.current().as_str(), "q8_0");
    assert!(stack.model.applied_tiers().is_empty());
    assert_eq!(
        stack.model.history()[0].options.tier,
        Some(QuantizationTier::from("f16"))
    );
}
