//! Live tier state: applies ladder decisions to the running model.

use std::sync::Arc;

use parking_lot::RwLock;
use vigil_kernel::{GatewayResult, QuantizationTier, TierSwitch};

use super::ladder::{QuantizationLadder, TierChangeReason, TierDecision};
use crate::memory::MemoryReading;

/// Owns the current quantization tier.
///
/// Concurrent adaptations are last-write-wins; the lock is never held across
/// the runtime switch.
pub struct TierController {
    ladder: QuantizationLadder,
    current: RwLock<QuantizationTier>,
    switch: Option<Arc<dyn TierSwitch>>,
}

impl TierController {
    pub fn new(ladder: QuantizationLadder, initial: impl Into<QuantizationTier>) -> Self {
        let initial = initial.into();
        if !ladder.contains(&initial) {
            tracing::warn!(tier = %initial, "initial tier not on the quantization ladder");
        }
        Self {
            ladder,
            current: RwLock::new(initial),
            switch: None,
        }
    }

    /// Apply tier changes to a runtime, not just to the recorded state.
    pub fn with_switch(mut self, switch: Arc<dyn TierSwitch>) -> Self {
        self.switch = Some(switch);
        self
    }

    pub fn ladder(&self) -> &QuantizationLadder {
        &self.ladder
    }

    pub fn current(&self) -> QuantizationTier {
        self.current.read().clone()
    }

    /// Select a tier for the given conditions and apply it when it differs.
    ///
    /// If the runtime rejects the switch the current tier is kept and the
    /// error returned.
    pub async fn adapt(
        &self,
        reading: Option<&MemoryReading>,
        complexity: Option<f64>,
    ) -> GatewayResult<TierDecision> {
        let current = self.current();
        let decision = self.ladder.select_tier(&current, reading, complexity);
        self.apply(decision).await
    }

    /// Move to a lighter tier to relieve memory.
    ///
    /// Uses the ladder's decision when it is a downgrade; otherwise steps
    /// down exactly one tier. At the lowest tier this is a no-op.
    pub async fn force_downgrade(
        &self,
        reading: Option<&MemoryReading>,
    ) -> GatewayResult<TierDecision> {
        let current = self.current();
        let current_index = self.ladder.index_of(&current);
        let decision = self.ladder.select_tier(&current, reading, None);

        let is_downgrade = match (&decision, current_index) {
            (TierDecision::Change { to, .. }, Some(index)) => {
                self.ladder.index_of(to).is_some_and(|target| target < index)
            }
            _ => false,
        };

        let decision = if is_downgrade {
            decision
        } else {
            match self.ladder.step_down(&current) {
                Some(lower) => TierDecision::Change {
                    from: current.clone(),
                    to: lower.clone(),
                    reason: TierChangeReason::Forced,
                },
                None => {
                    tracing::debug!(tier = %current, "already at the lowest tier");
                    TierDecision::Unchanged { tier: current }
                }
            }
        };
        self.apply(decision).await
    }

    async fn apply(&self, decision: TierDecision) -> GatewayResult<TierDecision> {
        let TierDecision::Change { from, to, reason } = &decision else {
            return Ok(decision);
        };

        if let Some(switch) = &self.switch {
            if let Err(e) = switch.apply_tier(to).await {
                tracing::error!(from = %from, to = %to, error = %e, "failed to switch quantization tier");
                return Err(e);
            }
        }

        *self.current.write() = to.clone();
        tracing::info!(from = %from, to = %to, reason = %reason, "quantization tier changed");
        Ok(decision)
    }
}

impl std::fmt::Debug for TierController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierController")
            .field("current", &*self.current.read())
            .field("tiers", &self.ladder.tiers())
            .field("has_switch", &self.switch.is_some())
            .finish()
    }
}
