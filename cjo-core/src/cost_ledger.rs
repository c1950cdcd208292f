//! Cost Ledger, φ-Governor and Circuit Breaker.
//!
//! The tier-breakdown/percentage math generalizes this codebase's existing
//! cost-tracking shape (totals attributed to a labeled bucket, reported as
//! sums and percentages) from "root vs recursive model cost" to "per-tier
//! cost".

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PHI_INV, PHI_INV2};
use crate::router::ModelTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub op_id: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub model_tier: ModelTier,
    pub cost: f64,
    pub budget_before: f64,
    pub budget_after: f64,
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub cost: f64,
    pub tokens: u64,
    pub ops: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CostLedgerConfig {
    pub initial_budget: f64,
    pub ring_capacity: usize,
    pub target_burn_rate: f64,
}

impl Default for CostLedgerConfig {
    fn default() -> Self {
        Self {
            initial_budget: 10.0,
            ring_capacity: 1024,
            target_burn_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Append-only in-memory ring of [`CostRecord`]s plus the φ-Governor and
/// circuit breaker that consult it.
pub struct CostLedger {
    config: CostLedgerConfig,
    records: VecDeque<CostRecord>,
    budget: f64,
    influence_ema: f64,
    breaker_state: BreakerState,
    breaker_opened_at: Option<Instant>,
}

impl CostLedger {
    pub fn new(config: CostLedgerConfig) -> Self {
        Self {
            budget: config.initial_budget,
            config,
            records: VecDeque::new(),
            influence_ema: (PHI_INV2 + PHI_INV) / 2.0,
            breaker_state: BreakerState::Closed,
            breaker_opened_at: None,
        }
    }

    pub fn remaining_budget(&self) -> f64 {
        self.budget
    }

    pub fn record(&mut self, op_id: impl Into<String>, tokens_in: u64, tokens_out: u64, tier: ModelTier, cost: f64) -> CostRecord {
        let budget_before = self.budget;
        self.budget -= cost;
        let degraded = self.budget < 0.0;
        let record = CostRecord {
            op_id: op_id.into(),
            tokens_in,
            tokens_out,
            model_tier: tier,
            cost,
            budget_before,
            budget_after: self.budget,
            degraded,
            timestamp: Utc::now(),
        };

        if self.records.len() == self.config.ring_capacity {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    pub fn burn_rate(&self, window: Duration) -> f64 {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60));
        let total: f64 = self.records.iter().filter(|r| r.timestamp >= cutoff).map(|r| r.cost).sum();
        total / window.as_secs_f64().max(1.0)
    }

    pub fn forecast_exhaustion(&self, window: Duration) -> Option<Duration> {
        let rate = self.burn_rate(window);
        if rate <= 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64((self.budget.max(0.0) / rate).min(1e9)))
        }
    }

    pub fn tier_breakdown(&self) -> HashMap<ModelTier, TierBreakdown> {
        let mut map: HashMap<ModelTier, TierBreakdown> = HashMap::new();
        for record in &self.records {
            let entry = map.entry(record.model_tier).or_default();
            entry.cost += record.cost;
            entry.tokens += record.tokens_in + record.tokens_out;
            entry.ops += 1;
        }
        map
    }

    pub fn calculate_savings_percentage(&self, baseline_tier: ModelTier) -> f64 {
        let breakdown = self.tier_breakdown();
        let baseline = breakdown.get(&baseline_tier).map(|b| b.cost).unwrap_or(0.0);
        let total: f64 = breakdown.values().map(|b| b.cost).sum();
        if baseline <= 0.0 {
            0.0
        } else {
            ((baseline - total) / baseline * 100.0).max(0.0)
        }
    }

    /// Update the φ-Governor's EMA of injected/total token ratio and return
    /// the next operation's injection-budget multiplier.
    pub fn governor_update(&mut self, injected_ratio: f64) -> f64 {
        let injected_ratio = injected_ratio.min(PHI_INV);
        self.influence_ema = 0.8 * self.influence_ema + 0.2 * injected_ratio;

        if self.influence_ema > PHI_INV {
            0.95
        } else if self.influence_ema < PHI_INV2 {
            1.05
        } else {
            1.0
        }
    }

    /// Whether an operation of the given class should be blocked.
    pub fn breaker_allows(&mut self) -> bool {
        match self.breaker_state {
            BreakerState::Closed => {
                if self.remaining_budget() <= 0.0 || self.burn_rate(Duration::from_secs(60)) > 2.0 * self.config.target_burn_rate {
                    self.breaker_state = BreakerState::Open;
                    self.breaker_opened_at = Some(Instant::now());
                    false
                } else {
                    true
                }
            }
            BreakerState::Open => {
                let elapsed = self.breaker_opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= Duration::from_secs(60) {
                    self.breaker_state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => true,
        }
    }

    pub fn breaker_report(&mut self, probe_succeeded: bool) {
        if self.breaker_state == BreakerState::HalfOpen {
            if probe_succeeded {
                self.breaker_state = BreakerState::Closed;
                self.breaker_opened_at = None;
            } else {
                self.breaker_state = BreakerState::Open;
                self.breaker_opened_at = Some(Instant::now());
            }
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_decrements_remaining_budget() {
        let mut ledger = CostLedger::new(CostLedgerConfig::default());
        ledger.record("op1", 100, 50, ModelTier::Balanced, 1.0);
        assert!((ledger.remaining_budget() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn governor_stays_in_dead_zone_between_phi_inv2_and_phi_inv() {
        let mut ledger = CostLedger::new(CostLedgerConfig::default());
        let multiplier = ledger.governor_update(0.5);
        assert!((multiplier - 1.0).abs() < 1e-9);
    }

    #[test]
    fn governor_never_treats_ratio_above_phi_inv_as_higher() {
        let mut ledger = CostLedger::new(CostLedgerConfig::default());
        let m1 = ledger.governor_update(0.99);
        let mut ledger2 = CostLedger::new(CostLedgerConfig::default());
        let m2 = ledger2.governor_update(PHI_INV);
        assert!((m1 - m2).abs() < 1e-9);
    }

    #[test]
    fn breaker_opens_when_budget_exhausted() {
        let mut ledger = CostLedger::new(CostLedgerConfig { initial_budget: 0.0, ..Default::default() });
        assert!(!ledger.breaker_allows());
        assert_eq!(ledger.breaker_state(), BreakerState::Open);
    }

    #[test]
    fn tier_breakdown_sums_per_tier_cost() {
        let mut ledger = CostLedger::new(CostLedgerConfig::default());
        ledger.record("a", 10, 10, ModelTier::Flagship, 1.0);
        ledger.record("b", 10, 10, ModelTier::Flagship, 1.0);
        ledger.record("c", 10, 10, ModelTier::Fast, 0.1);
        let breakdown = ledger.tier_breakdown();
        assert!((breakdown[&ModelTier::Flagship].cost - 2.0).abs() < 1e-9);
        assert_eq!(breakdown[&ModelTier::Flagship].ops, 2);
    }
}
