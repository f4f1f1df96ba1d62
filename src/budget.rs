//! Call budget across ordered provider tiers.
//!
//! Tiers are consumed strictly in declared order: tier `i` is only selected once the
//! cumulative limits of tiers `0..i` are used up. Selection is a pure function of the
//! call counter, so any process sharing the counter can reuse it.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One provider tier: a model/provider name and how many calls it may take per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTier {
    pub name: String,
    pub limit: u32,
}

impl ProviderTier {
    pub fn new(name: impl Into<String>, limit: u32) -> Self {
        Self {
            name: name.into(),
            limit,
        }
    }
}

/// Sum of all tier limits.
pub fn total_limit(tiers: &[ProviderTier]) -> u32 {
    tiers.iter().fold(0u32, |acc, t| acc.saturating_add(t.limit))
}

/// Provider for the next call given `calls_made`, or `None` once every tier is used up.
pub fn current_provider(calls_made: u32, tiers: &[ProviderTier]) -> Option<&ProviderTier> {
    let mut cumulative = 0u32;
    for tier in tiers {
        cumulative = cumulative.saturating_add(tier.limit);
        if calls_made < cumulative {
            return Some(tier);
        }
    }
    None
}

/// Run-scoped call counter. Invariant: `0 <= calls_made <= total_limit(tiers)`.
#[derive(Debug, Clone)]
pub struct CallBudget {
    tiers: Vec<ProviderTier>,
    calls_made: u32,
}

impl CallBudget {
    pub fn new(tiers: Vec<ProviderTier>) -> Self {
        Self {
            tiers,
            calls_made: 0,
        }
    }

    pub fn tiers(&self) -> &[ProviderTier] {
        &self.tiers
    }

    pub fn calls_made(&self) -> u32 {
        self.calls_made
    }

    pub fn total(&self) -> u32 {
        total_limit(&self.tiers)
    }

    pub fn remaining(&self) -> u32 {
        self.total().saturating_sub(self.calls_made)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current().is_none()
    }

    /// Tier the next call would use.
    pub fn current(&self) -> Option<&ProviderTier> {
        current_provider(self.calls_made, &self.tiers)
    }

    /// Take one slot and return the tier to call. When exhausted the counter is untouched.
    pub fn consume(&mut self) -> Result<ProviderTier, PipelineError> {
        let tier = self.current().ok_or(PipelineError::BudgetExhausted)?.clone();
        self.calls_made += 1;
        Ok(tier)
    }

    /// Give back a slot taken by [`CallBudget::consume`] for a call that failed.
    pub fn refund(&mut self) {
        self.calls_made = self.calls_made.saturating_sub(1);
    }

    /// Start a new run.
    pub fn reset(&mut self) {
        self.calls_made = 0;
    }
}
