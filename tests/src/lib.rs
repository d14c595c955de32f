//! Vigil Testing Framework
//!
//! Scriptable stand-ins for the model runtime, the retrieval subsystem and
//! the host's memory statistics, so the controller can be exercised without
//! a live Ollama server or real memory pressure.

pub mod memory;
pub mod model;
pub mod retrieval;

pub use memory::ScriptedMemorySource;
pub use model::MockModelGateway;
pub use retrieval::MockRetrievalGateway;

/// Assert how many generate calls reached a [`MockModelGateway`].
#[macro_export]
macro_rules! assert_generate_calls {
    ($model:expr, $expected:expr) => {
        let count = $model.call_count();
        assert_eq!(
            count, $expected,
            "expected {} generate call(s) to reach the model, got {}",
            $expected, count
        );
    };
}
