//! Dimensions, axioms and the residual ("THE_UNNAMEABLE") meta-dimension.

use crate::constants::{PHI, PHI_INV, PHI_INV2};
use serde::{Deserialize, Serialize};

/// One of the five axiom groupings a dimension rolls up into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axiom {
    Phi,
    Verify,
    Culture,
    Burn,
    Fidelity,
}

impl Axiom {
    pub const ALL: [Axiom; 5] = [
        Axiom::Phi,
        Axiom::Verify,
        Axiom::Culture,
        Axiom::Burn,
        Axiom::Fidelity,
    ];

    /// The seven named dimensions belonging to this axiom, in the fixed
    /// order the weight template is applied against.
    pub const fn dimensions(self) -> [&'static str; 7] {
        match self {
            Axiom::Phi => [
                "structure",
                "elegance",
                "parsimony",
                "symmetry",
                "composability",
                "coherence",
                "proportion",
            ],
            Axiom::Verify => [
                "correctness",
                "test_coverage",
                "determinism",
                "error_handling",
                "boundary_cases",
                "reproducibility",
                "provenance",
            ],
            Axiom::Culture => [
                "readability",
                "convention_fit",
                "documentation",
                "naming",
                "team_norms",
                "review_friendliness",
                "onboarding_cost",
            ],
            Axiom::Burn => [
                "resource_cost",
                "latency",
                "token_efficiency",
                "scalability",
                "operational_risk",
                "rollback_ease",
                "blast_radius",
            ],
            Axiom::Fidelity => [
                "intent_match",
                "spec_adherence",
                "requirement_coverage",
                "side_effect_control",
                "backward_compatibility",
                "observability",
                "auditability",
            ],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axiom::Phi => "PHI",
            Axiom::Verify => "VERIFY",
            Axiom::Culture => "CULTURE",
            Axiom::Burn => "BURN",
            Axiom::Fidelity => "FIDELITY",
        }
    }
}

/// The universal per-axiom weight template, applied in dimension order.
pub const WEIGHT_TEMPLATE: [f64; 7] = [PHI, PHI_INV, 1.0, PHI, PHI_INV2, PHI_INV, PHI_INV];

/// Total count of named dimensions across all five axioms (35) plus the
/// residual (1) = 36.
pub const NAMED_DIMENSION_COUNT: usize = 35;
pub const TOTAL_DIMENSION_COUNT: usize = 36;
pub const RESIDUAL_NAME: &str = "THE_UNNAMEABLE";

/// All 35 named dimensions in canonical (axiom, then in-axiom) order.
pub fn all_named_dimensions() -> Vec<&'static str> {
    Axiom::ALL
        .iter()
        .flat_map(|a| a.dimensions().into_iter())
        .collect()
}

/// A single scorer's output for one dimension. `None` means the scorer
/// failed and the slot is "unreliable — exclude from aggregate, count toward
/// residual".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension_name: String,
    pub score: Option<f64>,
    pub scorer_version: String,
}

impl DimensionScore {
    pub fn new(dimension_name: impl Into<String>, score: f64, scorer_version: impl Into<String>) -> Self {
        Self {
            dimension_name: dimension_name.into(),
            score: Some(score.clamp(0.0, 100.0)),
            scorer_version: scorer_version.into(),
        }
    }

    pub fn failed(dimension_name: impl Into<String>, scorer_version: impl Into<String>) -> Self {
        Self {
            dimension_name: dimension_name.into(),
            score: None,
            scorer_version: scorer_version.into(),
        }
    }
}

/// An aggregated score for one of the five axioms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxiomScore {
    pub axiom: Axiom,
    pub value: f64,
}

/// `A_axiom = Σ(W_i · score_i) / Σ(W_i)` over the axiom's 7 dimensions.
///
/// `scores` must be in the same fixed order as [`Axiom::dimensions`].
/// Missing (`None`) scores are imputed to the mean of their axiom siblings
/// before the weighted mean is taken, per the Judgment Engine contract.
pub fn aggregate_axiom(axiom: Axiom, scores: &[Option<f64>; 7]) -> AxiomScore {
    let present: Vec<f64> = scores.iter().filter_map(|s| *s).collect();
    let sibling_mean = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };

    let imputed: [f64; 7] = std::array::from_fn(|i| scores[i].unwrap_or(sibling_mean));

    let weighted_sum: f64 = WEIGHT_TEMPLATE
        .iter()
        .zip(imputed.iter())
        .map(|(w, s)| w * s)
        .sum();
    let weight_sum: f64 = WEIGHT_TEMPLATE.iter().sum();

    AxiomScore {
        axiom,
        value: (weighted_sum / weight_sum).clamp(0.0, 100.0),
    }
}

/// `Q = 100 · ((A_PHI·A_VERIFY·A_CULTURE·A_BURN·A_FIDELITY)/100⁵)^(1/5)`
/// (geometric mean of the five axiom scores).
pub fn q_score(axiom_scores: &[AxiomScore; 5]) -> f64 {
    let product: f64 = axiom_scores.iter().map(|a| a.value / 100.0).product();
    100.0 * product.max(0.0).powf(1.0 / 5.0)
}

/// `R = 100·(1 − σ/50)` clamped to `[0,100]`, where σ is the standard
/// deviation of the 35 named-dimension scores. Only dimensions that were
/// actually scored (not imputed) contribute to σ; the result is then
/// penalised proportionally to the fraction of dimensions that were never
/// scored (capped by a route decision, or failed past retry), so an item
/// scored on 5 of 35 dimensions can't reach the same residual as one scored
/// on 34 of 35.
pub fn residual(named_scores: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = named_scores.iter().filter_map(|s| *s).collect();
    if present.is_empty() {
        return 0.0;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let variance = present.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / present.len() as f64;
    let sigma = variance.sqrt();

    let unscored_fraction = (named_scores.len() - present.len()) as f64 / named_scores.len() as f64;
    let base = 100.0 * (1.0 - sigma / 50.0);

    (base * (1.0 - unscored_fraction)).clamp(0.0, 100.0)
}
