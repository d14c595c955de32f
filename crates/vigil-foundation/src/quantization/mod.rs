//! Quantization tier selection driven by memory pressure and content
//! complexity.

pub mod complexity;
pub mod controller;
pub mod ladder;

pub use complexity::{ComplexityScore, estimate as estimate_complexity};
pub use controller::TierController;
pub use ladder::{
    DEFAULT_TIERS, QuantizationConfig, QuantizationLadder, TierChangeReason, TierDecision,
};
