//! Command implementations

pub mod complexity;
pub mod generate;
pub mod monitor;
pub mod status;
pub mod tiers;
