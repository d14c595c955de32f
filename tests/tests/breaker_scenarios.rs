//! Circuit breaker behavior as seen through the protected model gateway

use std::sync::Arc;
use std::time::Duration;
use vigil_foundation::{
    CircuitBreaker, CircuitBreakerConfig, ProtectedModelGateway, ResponseCache, State,
};
use vigil_kernel::{GatewayError, GenerateOptions, ModelGateway};
use vigil_testing::{MockModelGateway, assert_generate_calls};

fn protected(model: &MockModelGateway) -> ProtectedModelGateway {
    let config = CircuitBreakerConfig::new("model")
        .with_failure_threshold(3)
        .with_recovery_timeout(Duration::from_secs(30));
    ProtectedModelGateway::new(
        Arc::new(model.clone()),
        Arc::new(CircuitBreaker::new(config)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_opens_rejects_and_recovers_after_timeout() {
    let model = MockModelGateway::new();
    let gateway = protected(&model);
    let options = GenerateOptions::new();

    model.fail_next(3);
    for i in 0..3 {
        let err = gateway.generate(&format!("q{i}"), &options).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
    assert_eq!(gateway.breaker().state(), State::Open);

    // Rejected without reaching the model
    let err = gateway.generate("q3", &options).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_generate_calls!(model, 3);

    tokio::time::advance(Duration::from_secs(31)).await;

    let response = gateway.generate("q4", &options).await.unwrap();
    assert_eq!(response, "This is a fallback mock response.");
    assert_eq!(gateway.breaker().state(), State::Closed);
    assert_eq!(gateway.breaker().failure_count(), 0);
    assert_generate_calls!(model, 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_circuit() {
    let model = MockModelGateway::new();
    let gateway = protected(&model);
    let options = GenerateOptions::new();

    model.set_failing(GatewayError::ProcessFailed("runtime exited".to_string()));
    for _ in 0..3 {
        let _ = gateway.generate("probe", &options).await;
    }
    assert_eq!(gateway.breaker().state(), State::Open);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(gateway.generate("probe", &options).await.is_err());
    assert_eq!(gateway.breaker().state(), State::Open);

    // Fresh timer: still open shortly after the failed trial
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(gateway.generate("probe", &options).await.unwrap_err().is_circuit_open());

    let snapshot = gateway.breaker_snapshot();
    assert_eq!(snapshot.metrics.total_failures, 4);
    assert!(snapshot.metrics.total_rejected >= 1);
}

#[tokio::test]
async fn test_unsupported_errors_do_not_trip_breaker() {
    let model = MockModelGateway::new();
    let gateway = protected(&model);
    let options = GenerateOptions::new();

    for _ in 0..5 {
        model.fail_next_with(GatewayError::Unsupported("streaming".to_string()));
        let _ = gateway.generate("x", &options).await;
    }
    assert_eq!(gateway.breaker().state(), State::Closed);
    assert_eq!(gateway.breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_cached_response_skips_model() {
    let model = MockModelGateway::new();
    model.add_mock_response("capital", "Paris");
    let gateway = protected(&model).with_cache(Arc::new(ResponseCache::new(8)));
    let options = GenerateOptions::new().with_max_tokens(16);

    assert_eq!(gateway.generate("capital of France?", &options).await.unwrap(), "Paris");
    assert_eq!(gateway.generate("capital of France?", &options).await.unwrap(), "Paris");
    assert_generate_calls!(model, 1);

    // Different options are a different request
    let other = GenerateOptions::new().with_max_tokens(32);
    gateway.generate("capital of France?", &other).await.unwrap();
    assert_generate_calls!(model, 2);
}
