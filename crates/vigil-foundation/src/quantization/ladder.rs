//! Ordered quantization tiers and the tier selection policy.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_kernel::QuantizationTier;

use crate::memory::MemoryReading;

pub const DEFAULT_TIERS: [&str; 5] = ["q4_0", "q4_k_m", "q5_k_m", "q8_0", "f16"];

/// Thresholds and ladder order for tier selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    /// Tiers from lowest quality (smallest memory) to highest
    pub tiers: Vec<QuantizationTier>,
    pub critical_memory_threshold: f64,
    pub high_memory_threshold: f64,
    pub medium_memory_threshold: f64,
    pub low_memory_threshold: f64,
    /// Step up one tier when memory is plentiful
    pub auto_improve_quality: bool,
    /// Complexity only raises the tier while memory is below this percent
    pub complexity_memory_ceiling: f64,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.iter().map(|t| QuantizationTier::from(*t)).collect(),
            critical_memory_threshold: 90.0,
            high_memory_threshold: 85.0,
            medium_memory_threshold: 75.0,
            low_memory_threshold: 60.0,
            auto_improve_quality: false,
            complexity_memory_ceiling: 70.0,
        }
    }
}

impl QuantizationConfig {
    /// Replace an unusable ladder or thresholds with defaults, logging a
    /// warning for each.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        let unique: HashSet<&QuantizationTier> = self.tiers.iter().collect();
        if self.tiers.is_empty() || unique.len() != self.tiers.len() {
            tracing::warn!(tiers = ?self.tiers, "invalid quantization ladder, using default");
            self.tiers = defaults.tiers.clone();
        }

        let in_range = |p: f64| p.is_finite() && (0.0..=100.0).contains(&p);
        let thresholds_ok = [
            self.low_memory_threshold,
            self.medium_memory_threshold,
            self.high_memory_threshold,
            self.critical_memory_threshold,
        ]
        .into_iter()
        .all(in_range)
            && self.low_memory_threshold < self.medium_memory_threshold
            && self.medium_memory_threshold < self.high_memory_threshold
            && self.high_memory_threshold <= self.critical_memory_threshold;
        if !thresholds_ok {
            tracing::warn!(
                low = self.low_memory_threshold,
                medium = self.medium_memory_threshold,
                high = self.high_memory_threshold,
                critical = self.critical_memory_threshold,
                "memory thresholds out of range or out of order, using defaults"
            );
            self.low_memory_threshold = defaults.low_memory_threshold;
            self.medium_memory_threshold = defaults.medium_memory_threshold;
            self.high_memory_threshold = defaults.high_memory_threshold;
            self.critical_memory_threshold = defaults.critical_memory_threshold;
        }

        if !in_range(self.complexity_memory_ceiling) {
            tracing::warn!(
                ceiling = self.complexity_memory_ceiling,
                "complexity memory ceiling out of range, using default"
            );
            self.complexity_memory_ceiling = defaults.complexity_memory_ceiling;
        }
        self
    }
}

/// Why the ladder chose a different tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierChangeReason {
    CriticalMemory { percent: f64 },
    HighMemory { percent: f64 },
    MediumMemory { percent: f64 },
    LowMemory { percent: f64 },
    Complexity { score: f64 },
    /// Requested by recovery when the ladder itself saw no reason to move
    Forced,
}

impl fmt::Display for TierChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalMemory { percent } => write!(f, "critical memory pressure ({percent:.1}%)"),
            Self::HighMemory { percent } => write!(f, "high memory pressure ({percent:.1}%)"),
            Self::MediumMemory { percent } => write!(f, "medium memory pressure ({percent:.1}%)"),
            Self::LowMemory { percent } => write!(f, "low memory pressure ({percent:.1}%)"),
            Self::Complexity { score } => write!(f, "content complexity {score:.2}"),
            Self::Forced => write!(f, "forced downgrade"),
        }
    }
}

/// Outcome of a tier selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TierDecision {
    Unchanged {
        tier: QuantizationTier,
    },
    Change {
        from: QuantizationTier,
        to: QuantizationTier,
        reason: TierChangeReason,
    },
}

impl TierDecision {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Change { .. })
    }

    /// The tier in effect once this decision is applied
    pub fn target(&self) -> &QuantizationTier {
        match self {
            Self::Unchanged { tier } => tier,
            Self::Change { to, .. } => to,
        }
    }
}

/// Fixed, ordered list of tiers plus the policy for moving along it.
#[derive(Debug, Clone)]
pub struct QuantizationLadder {
    config: QuantizationConfig,
}

impl Default for QuantizationLadder {
    fn default() -> Self {
        Self::new(QuantizationConfig::default())
    }
}

impl QuantizationLadder {
    pub fn new(config: QuantizationConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &QuantizationConfig {
        &self.config
    }

    pub fn tiers(&self) -> &[QuantizationTier] {
        &self.config.tiers
    }

    pub fn lowest(&self) -> &QuantizationTier {
        &self.config.tiers[0]
    }

    pub fn highest(&self) -> &QuantizationTier {
        &self.config.tiers[self.top()]
    }

    pub fn contains(&self, tier: &QuantizationTier) -> bool {
        self.index_of(tier).is_some()
    }

    pub fn index_of(&self, tier: &QuantizationTier) -> Option<usize> {
        self.config.tiers.iter().position(|t| t == tier)
    }

    /// One tier below `current`, or `None` at the bottom.
    pub fn step_down(&self, current: &QuantizationTier) -> Option<&QuantizationTier> {
        let index = self.resolve_index(current);
        index.checked_sub(1).map(|i| &self.config.tiers[i])
    }

    fn top(&self) -> usize {
        self.config.tiers.len() - 1
    }

    /// Position of `current`, treating an unknown tier as the lowest.
    fn resolve_index(&self, current: &QuantizationTier) -> usize {
        self.index_of(current).unwrap_or_else(|| {
            tracing::warn!(tier = %current, "tier not on the quantization ladder, treating as lowest");
            0
        })
    }

    /// Choose the tier to run at, given memory pressure and content
    /// complexity. Pure: the caller applies the decision.
    ///
    /// Memory bands are evaluated first. A critical reading forces the lowest
    /// tier and cannot be overridden. Otherwise complexity may raise the
    /// target (never lower it) while memory stays under the complexity
    /// ceiling. Without a reading, only the current tier is kept.
    pub fn select_tier(
        &self,
        current: &QuantizationTier,
        reading: Option<&MemoryReading>,
        complexity: Option<f64>,
    ) -> TierDecision {
        let cfg = &self.config;
        let top = self.top();
        let index = self.resolve_index(current);
        let mut target = index;
        let mut reason = None;
        let mut critical = false;

        if let Some(reading) = reading {
            let percent = reading.percent_used;
            if percent >= cfg.critical_memory_threshold {
                target = 0;
                critical = true;
                reason = Some(TierChangeReason::CriticalMemory { percent });
                tracing::warn!(percent, "critical memory pressure, forcing lowest quantization");
            } else if percent > cfg.high_memory_threshold {
                target = index.saturating_sub(2);
                reason = Some(TierChangeReason::HighMemory { percent });
            } else if percent > cfg.medium_memory_threshold {
                target = index.saturating_sub(1);
                reason = Some(TierChangeReason::MediumMemory { percent });
            } else if percent < cfg.low_memory_threshold && cfg.auto_improve_quality && index < top {
                target = index + 1;
                reason = Some(TierChangeReason::LowMemory { percent });
            }
        }

        match (complexity, reading) {
            (Some(score), _) if !score.is_finite() => {
                tracing::warn!(score, "ignoring non-finite complexity score");
            }
            (Some(score), Some(reading))
                if !critical && reading.percent_used < cfg.complexity_memory_ceiling =>
            {
                let score = score.clamp(0.0, 1.0);
                let step = (score * 2.0).floor() as usize;
                let complexity_target = (index + step).min(top);
                if complexity_target > target {
                    target = complexity_target;
                    reason = Some(TierChangeReason::Complexity { score });
                }
            }
            _ => {}
        }

        if target == index {
            return TierDecision::Unchanged {
                tier: current.clone(),
            };
        }

        TierDecision::Change {
            from: current.clone(),
            to: cfg.tiers[target].clone(),
            // A moved target always has a reason recorded above.
            reason: reason.unwrap_or(TierChangeReason::Forced),
        }
    }
}
