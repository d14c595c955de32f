//! Gateway compositions: circuit-breaker protection and per-request tier
//! adaptation, both exposing the wrapped gateway's own trait.

pub mod adaptive;
pub mod protected;

pub use adaptive::AdaptiveModelGateway;
pub use protected::{ProtectedModelGateway, ProtectedRetrievalGateway};
