//! Judgment Engine: scores 36 dimensions in parallel and aggregates into a
//! [`Judgment`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{GROWL_FLOOR, PHI_INV};
use crate::dimension::{aggregate_axiom, all_named_dimensions, q_score, residual, Axiom, AxiomScore, DimensionScore};
use crate::error::{Error, Result};
use crate::item::{Classification, Item, ItemKind};
use crate::worker_pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Howl,
    Wag,
    Growl,
    Bark,
}

/// `Q >= 80 -> HOWL`, `[50,80) -> WAG`, `[38.2,50) -> GROWL`, `< 38.2 -> BARK`.
/// Lower boundary belongs to the lower band.
pub fn verdict_for(q: f64) -> Verdict {
    if q >= 80.0 {
        Verdict::Howl
    } else if q >= 50.0 {
        Verdict::Wag
    } else if q >= GROWL_FLOOR {
        Verdict::Growl
    } else {
        Verdict::Bark
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    pub axiom_scores: [AxiomScore; 5],
    pub dimensions: Vec<DimensionScore>,
    pub q_score: f64,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning_path: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The uniform `(dim, item, ctx, deadline) -> score|error` shape every
/// dimension scorer implements, whether LLM-backed or heuristic.
pub type Scorer = Arc<
    dyn Fn(&'static str, Arc<Item>, Arc<Classification>, Duration) -> Pin<Box<dyn Future<Output = Result<f64>> + Send>>
        + Send
        + Sync,
>;

/// A deterministic heuristic scorer usable without an LLM adapter: maps a
/// dimension name and item body to a score in `[0,100]` via a stable hash,
/// so tests are repeatable.
pub fn heuristic_scorer() -> Scorer {
    Arc::new(|dimension: &'static str, item: Arc<Item>, _classification: Arc<Classification>, _deadline: Duration| {
        Box::pin(async move {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};
            let mut hasher = DefaultHasher::new();
            dimension.hash(&mut hasher);
            item.body.hash(&mut hasher);
            let bucket = (hasher.finish() % 1000) as f64 / 10.0; // 0.0..100.0
            Ok(bucket)
        })
    })
}

pub struct JudgmentEngineConfig {
    pub per_dimension_deadline: Duration,
    pub max_failures_allowed: usize,
}

impl Default for JudgmentEngineConfig {
    fn default() -> Self {
        Self {
            per_dimension_deadline: Duration::from_secs(2),
            max_failures_allowed: 7,
        }
    }
}

pub struct JudgmentEngine {
    pool: WorkerPool,
    scorer: Scorer,
    config: JudgmentEngineConfig,
}

impl JudgmentEngine {
    pub fn new(pool: WorkerPool, scorer: Scorer, config: JudgmentEngineConfig) -> Self {
        Self { pool, scorer, config }
    }

    /// Score an item, optionally capping scoring depth (`max_dimensions`,
    /// from the Router's `RouteDecision`). Un-scored dimensions (beyond the
    /// cap, or whose scorer failed past retry) are imputed to their axiom
    /// siblings' mean; the residual is computed only from the dimensions
    /// that were actually scored.
    #[tracing::instrument(skip(self, item, classification), fields(item_id = %item.id))]
    pub async fn judge(&self, item: &Item, classification: &Classification, max_dimensions: Option<usize>) -> Result<Judgment> {
        let all_dims = all_named_dimensions();
        let scored_dims: Vec<&'static str> = match max_dimensions {
            Some(cap) if cap < all_dims.len() => all_dims.into_iter().take(cap).collect(),
            _ => all_dims,
        };

        let item_arc = Arc::new(item.clone());
        let classification_arc = Arc::new(classification.clone());
        let deadline = self.config.per_dimension_deadline;

        let jobs: Vec<_> = scored_dims
            .iter()
            .map(|&dim| {
                let scorer = Arc::clone(&self.scorer);
                let item_arc = Arc::clone(&item_arc);
                let classification_arc = Arc::clone(&classification_arc);
                move || scorer(dim, Arc::clone(&item_arc), Arc::clone(&classification_arc), deadline)
            })
            .collect();

        let results = self.pool.run_all(jobs, deadline).await;

        let mut named_scores: Vec<Option<f64>> = vec![None; 35];
        let mut dimension_scores = Vec::with_capacity(36);
        let mut failed = 0usize;

        let all_names = all_named_dimensions();
        for (i, name) in all_names.iter().enumerate() {
            let scored_index = scored_dims.iter().position(|d| d == name);
            match scored_index.and_then(|si| results.get(si)) {
                Some(Ok(score)) => {
                    named_scores[i] = Some(*score);
                    dimension_scores.push(DimensionScore::new(*name, *score, "heuristic-v1"));
                }
                Some(Err(_)) => {
                    failed += 1;
                    dimension_scores.push(DimensionScore::failed(*name, "heuristic-v1"));
                }
                None => {
                    dimension_scores.push(DimensionScore::failed(*name, "unscored"));
                }
            }
        }

        if failed > self.config.max_failures_allowed {
            return Err(Error::insufficient_signal(failed, 35));
        }

        let mut axiom_scores_vec = Vec::with_capacity(5);
        for axiom in Axiom::ALL {
            let offset = Axiom::ALL.iter().take_while(|a| *a != &axiom).map(|a| a.dimensions().len()).sum::<usize>();
            let slice: [Option<f64>; 7] = std::array::from_fn(|i| named_scores[offset + i]);
            axiom_scores_vec.push(aggregate_axiom(axiom, &slice));
        }
        let axiom_scores: [AxiomScore; 5] = axiom_scores_vec.try_into().expect("exactly five axioms");

        let q = q_score(&axiom_scores);
        let residual_score = residual(&named_scores);
        dimension_scores.push(DimensionScore::new("THE_UNNAMEABLE", residual_score, "derived"));

        let verdict = verdict_for(q);

        let mut confidence = 0.5 * (q / 100.0) + 0.5 * (residual_score / 100.0);
        if residual_score < GROWL_FLOOR {
            confidence *= PHI_INV;
        }
        confidence = confidence.clamp(0.0, PHI_INV);

        let mut reasoning_path = vec![format!("scored {} of 35 named dimensions", 35 - failed)];
        if residual_score < GROWL_FLOOR {
            reasoning_path.push("self-skepticism penalty applied: residual below GROWL floor".into());
        }

        Ok(Judgment {
            id: Uuid::new_v4(),
            item_id: item.id,
            item_kind: item.kind,
            axiom_scores,
            dimensions: dimension_scores,
            q_score: q,
            verdict,
            confidence,
            reasoning_path,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Complexity;

    fn engine(max_failures: usize) -> JudgmentEngine {
        JudgmentEngine::new(
            WorkerPool::new(4),
            heuristic_scorer(),
            JudgmentEngineConfig { per_dimension_deadline: Duration::from_millis(200), max_failures_allowed: max_failures },
        )
    }

    #[test]
    fn verdict_bands_match_exact_boundaries() {
        assert_eq!(verdict_for(80.0), Verdict::Howl);
        assert_eq!(verdict_for(79.999), Verdict::Wag);
        assert_eq!(verdict_for(50.0), Verdict::Wag);
        assert_eq!(verdict_for(38.2), Verdict::Growl);
        assert_eq!(verdict_for(38.199), Verdict::Bark);
    }

    #[tokio::test]
    async fn judge_produces_confidence_within_phi_inv_bound() {
        let engine = engine(7);
        let item = Item::new(crate::item::ItemKind::CodeReview, "reviewed, patched, tested");
        let classification = Classification::new("review", "code", Complexity::Moderate, 0.01);
        let judgment = engine.judge(&item, &classification, None).await.unwrap();
        assert!(judgment.confidence <= PHI_INV + 1e-12);
        assert!(judgment.confidence >= 0.0);
        assert_eq!(judgment.dimensions.len(), 36);
    }

    #[tokio::test]
    async fn capped_dimensions_still_produce_a_judgment() {
        let engine = engine(30);
        let item = Item::new(crate::item::ItemKind::FreeText, "hi");
        let classification = Classification::new("chat", "general", Complexity::Trivial, 0.0);
        let judgment = engine.judge(&item, &classification, Some(18)).await.unwrap();
        assert_eq!(judgment.dimensions.len(), 36);
    }

    proptest::proptest! {
        #[test]
        fn judge_confidence_stays_within_phi_inv_across_random_bodies(body in "[a-zA-Z0-9 ,.]{0,80}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let engine = engine(35);
            let item = Item::new(crate::item::ItemKind::FreeText, &body);
            let classification = Classification::new("chat", "general", Complexity::Trivial, 0.0);
            let judgment = rt.block_on(engine.judge(&item, &classification, None));
            if let Ok(judgment) = judgment {
                prop_assert!(judgment.confidence <= PHI_INV + 1e-12);
                prop_assert!(judgment.confidence >= 0.0);
            }
        }

        #[test]
        fn verdict_for_matches_bands_for_any_q(q in 0.0f64..150.0) {
            let verdict = verdict_for(q);
            if q >= 80.0 {
                prop_assert_eq!(verdict, Verdict::Howl);
            } else if q >= 50.0 {
                prop_assert_eq!(verdict, Verdict::Wag);
            } else if q >= GROWL_FLOOR {
                prop_assert_eq!(verdict, Verdict::Growl);
            } else {
                prop_assert_eq!(verdict, Verdict::Bark);
            }
        }
    }

    #[tokio::test]
    async fn too_many_failures_yields_insufficient_signal() {
        let failing_scorer: Scorer = Arc::new(|_dim, _item, _ctx, _deadline| {
            Box::pin(async move { Err(Error::scorer_failure("x", "forced failure")) })
        });
        let engine = JudgmentEngine::new(
            WorkerPool::new(4),
            failing_scorer,
            JudgmentEngineConfig { per_dimension_deadline: Duration::from_millis(50), max_failures_allowed: 7 },
        );
        let item = Item::new(crate::item::ItemKind::FreeText, "hi");
        let classification = Classification::new("chat", "general", Complexity::Trivial, 0.0);
        let result = engine.judge(&item, &classification, None).await;
        assert!(matches!(result, Err(Error::InsufficientSignal { .. })));
    }
}
