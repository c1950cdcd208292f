//! Kabbalistic Router: classification -> `RouteDecision`, blending static
//! Lightning Paths, Q-learned state and Thompson-sampled voter weights.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bandit::select_above_threshold;
use crate::cost_ledger::CostLedger;
use crate::dog::DogName;
use crate::item::Classification;
use crate::qlearning::{ActionKey, QState, StateKey};
use crate::track_record::TrackRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Flagship,
    Balanced,
    Fast,
}

impl ModelTier {
    /// The next cheaper tier, or `self` if already cheapest.
    pub fn next_cheaper(self) -> Self {
        match self {
            ModelTier::Flagship => ModelTier::Balanced,
            ModelTier::Balanced => ModelTier::Fast,
            ModelTier::Fast => ModelTier::Fast,
        }
    }

    pub fn cheapest() -> Self {
        ModelTier::Fast
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Single,
    Consensus,
    Dialectic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub voter_set: Vec<DogName>,
    pub tier: ModelTier,
    pub max_dimensions_scored: usize,
    pub strategy: Strategy,
    pub cost_budget: f64,
    pub explored: bool,
}

/// Static domain -> voter-set seed table, consulted before any learning
/// adjustment. Deterministic.
fn lightning_path(domain: &str) -> Vec<DogName> {
    use DogName::*;
    match domain {
        "code" => vec![Guardian, Analyst, Architect, Scholar, Cynic, Sage, Scout],
        "tokens" => vec![Guardian, Analyst, Oracle, Scout, Cynic],
        "patterns" => vec![Guardian, Cartographer, Sage, Scholar, Oracle],
        "tooling" => vec![Guardian, Deployer, Janitor, Analyst, Scout],
        _ => vec![Guardian, Analyst, Sage, Scout, Cynic],
    }
}

fn tier_for_complexity(complexity: &str) -> ModelTier {
    match complexity {
        "trivial" | "simple" => ModelTier::Fast,
        "moderate" => ModelTier::Balanced,
        _ => ModelTier::Flagship,
    }
}

fn max_dims_for_tier(tier: ModelTier) -> usize {
    match tier {
        ModelTier::Flagship => 36,
        ModelTier::Balanced => 28,
        ModelTier::Fast => 18,
    }
}

pub struct RouterConfig {
    pub per_domain_min_weight: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { per_domain_min_weight: 1.0 }
    }
}

pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// Decide a `RouteDecision` for a classification. `track_records` gives
    /// this call's Thompson-sampling inputs (dog -> track record); `q_state`
    /// supplies learned action preference; `ledger` gates tier by remaining
    /// budget.
    pub fn route(
        &self,
        classification: &Classification,
        track_records: &[(DogName, TrackRecord)],
        q_state: &QState,
        ledger: &CostLedger,
        rng: &mut impl Rng,
    ) -> RouteDecision {
        let state = StateKey::new(
            classification.intent.clone(),
            classification.domain.clone(),
            classification.complexity.to_string(),
            chrono::Utc::now().hour_bucket(),
        );

        let base_tier = tier_for_complexity(&classification.complexity.to_string());
        let candidates = [ActionKey("single".into()), ActionKey("consensus".into()), ActionKey("dialectic".into())];

        let roll: f64 = rng.gen();
        let mut explored = true;
        let action = if q_state.has_converged(&state, roll) {
            explored = false;
            q_state.argmax(&state, &candidates).unwrap_or(ActionKey("consensus".into()))
        } else {
            let idx = rng.gen_range(0..candidates.len());
            candidates[idx].clone()
        };

        let strategy = match action.0.as_str() {
            "single" => Strategy::Single,
            "dialectic" => Strategy::Dialectic,
            _ => Strategy::Consensus,
        };

        let lightning = lightning_path(&classification.domain);
        let seed_records: Vec<(DogName, TrackRecord)> = lightning
            .iter()
            .map(|name| {
                let track = track_records
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, t)| *t)
                    .unwrap_or_default();
                (*name, track)
            })
            .collect();

        let retained = select_above_threshold(&seed_records, self.config.per_domain_min_weight, rng);
        let voter_set: Vec<DogName> = retained.into_iter().map(|(name, _)| name).collect();

        let predicted_cost = classification.est_cost;
        let remaining = ledger.remaining_budget();

        let (tier, max_dimensions_scored, strategy) = if predicted_cost > remaining {
            let mut degraded_tier = base_tier;
            while degraded_tier != ModelTier::cheapest() && degraded_tier.cost_factor() * predicted_cost > remaining {
                degraded_tier = degraded_tier.next_cheaper();
            }
            if degraded_tier.cost_factor() * predicted_cost > remaining {
                (ModelTier::cheapest(), 18, Strategy::Single)
            } else {
                (degraded_tier, max_dims_for_tier(degraded_tier), strategy)
            }
        } else {
            (base_tier, max_dims_for_tier(base_tier), strategy)
        };

        RouteDecision {
            voter_set,
            tier,
            max_dimensions_scored,
            strategy,
            cost_budget: remaining,
            explored,
        }
    }
}

impl ModelTier {
    fn cost_factor(self) -> f64 {
        match self {
            ModelTier::Flagship => 1.0,
            ModelTier::Balanced => 0.4,
            ModelTier::Fast => 0.15,
        }
    }
}

trait HourBucket {
    fn hour_bucket(&self) -> u8;
}

impl HourBucket for chrono::DateTime<chrono::Utc> {
    fn hour_bucket(&self) -> u8 {
        use chrono::Timelike;
        self.hour() as u8
    }
}
