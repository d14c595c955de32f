//! Published health state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_kernel::QuantizationTier;

use crate::circuit_breaker::CircuitBreakerSnapshot;
use crate::memory::MemoryTrend;

/// Monitored components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Model,
    Memory,
    Rag,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Model => write!(f, "model"),
            Component::Memory => write!(f, "memory"),
            Component::Rag => write!(f, "rag"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentHealth {
    Healthy,
    Unhealthy,
}

impl ComponentHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ComponentHealth::Healthy)
    }
}

impl From<bool> for ComponentHealth {
    fn from(healthy: bool) -> Self {
        if healthy {
            ComponentHealth::Healthy
        } else {
            ComponentHealth::Unhealthy
        }
    }
}

impl fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentHealth::Healthy => write!(f, "healthy"),
            ComponentHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Immutable view of the system's health after a check cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// `None` until the first cycle completes
    pub checked_at: Option<DateTime<Utc>>,
    pub cycle: u64,
    pub model: ComponentHealth,
    pub memory: ComponentHealth,
    /// Present only when a retrieval gateway is monitored
    pub rag: Option<ComponentHealth>,
    pub memory_percent: Option<f64>,
    pub memory_trend: Option<MemoryTrend>,
    pub current_tier: Option<QuantizationTier>,
    pub breakers: Vec<CircuitBreakerSnapshot>,
}

impl HealthSnapshot {
    /// State before any check has run: every monitored component presumed
    /// healthy.
    pub fn initial(has_rag: bool) -> Self {
        Self {
            checked_at: None,
            cycle: 0,
            model: ComponentHealth::Healthy,
            memory: ComponentHealth::Healthy,
            rag: has_rag.then_some(ComponentHealth::Healthy),
            memory_percent: None,
            memory_trend: None,
            current_tier: None,
            breakers: Vec::new(),
        }
    }

    pub fn component(&self, component: Component) -> Option<ComponentHealth> {
        match component {
            Component::Model => Some(self.model),
            Component::Memory => Some(self.memory),
            Component::Rag => self.rag,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.model.is_healthy()
            && self.memory.is_healthy()
            && self.rag.is_none_or(|h| h.is_healthy())
    }
}

impl fmt::Display for HealthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.checked_at {
            Some(at) => writeln!(f, "Health (cycle {}, {}):", self.cycle, at.to_rfc3339())?,
            None => writeln!(f, "Health (not checked yet):")?,
        }
        writeln!(f, "  model:  {}", self.model)?;
        match (self.memory_percent, self.memory_trend) {
            (Some(percent), Some(trend)) => {
                writeln!(f, "  memory: {} ({percent:.1}%, {trend})", self.memory)?
            }
            _ => writeln!(f, "  memory: {}", self.memory)?,
        }
        if let Some(rag) = self.rag {
            writeln!(f, "  rag:    {rag}")?;
        }
        if let Some(tier) = &self.current_tier {
            writeln!(f, "  tier:   {tier}")?;
        }
        for breaker in &self.breakers {
            writeln!(
                f,
                "  breaker '{}': {} ({} failures)",
                breaker.name, breaker.state, breaker.failure_count
            )?;
        }
        Ok(())
    }
}
