//! # cjo-core
//!
//! Collective Judgment Orchestrator: turns incoming items (prompts, tool
//! invocations, code diffs) into scored, consensus-validated judgments with
//! calibrated confidence, learning from outcomes over time.
//!
//! ## Core components
//!
//! - **Judgment Engine**: parallel 36-dimension scorer aggregated into 5
//!   axiom scores plus a residual meta-dimension.
//! - **Dog Pack**: 11 named voters behind a streaming, early-exit weighted
//!   consensus protocol.
//! - **Router**: classification + bandit-weighted voter selection +
//!   Q-learned routing.
//! - **Orchestrator**: the critical-path coordinator and its detached
//!   background tail.
//! - **Event Fabric**: three logical buses bridged loop-safely.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cjo_core::{Item, ItemKind, Orchestrator};
//!
//! let item = Item::new(ItemKind::CodeReview, "reviewed, patched, tested");
//! let envelope = orchestrator.submit(item).await?;
//! println!("{:?}", envelope.judgment.unwrap().verdict);
//! ```

extern crate self as cjo_core;

pub mod bandit;
pub mod classifier;
pub mod consensus;
pub mod constants;
pub mod cost_ledger;
pub mod dimension;
pub mod dog;
pub mod env;
pub mod error;
pub mod events;
pub mod item;
pub mod judgment;
pub mod llm_adapter;
pub mod orchestrator;
pub mod qlearning;
pub mod router;
pub mod store;
pub mod track_record;
pub mod worker_pool;

pub use bandit::{sample_weight, select_above_threshold};
pub use classifier::{classify, topic_for};
pub use consensus::{
    ConsensusResult, Division, DogPack, MarkovPredictor, Outcome, Prediction, PredictedOutcome,
    Tallies, VoteAnomaly,
};
pub use constants::{GROWL_FLOOR, PHI, PHI_INV, PHI_INV2, PHI_INV3, PHI_INV4, TOLERANCE};
pub use cost_ledger::{BreakerState, CostLedger, CostLedgerConfig, CostRecord, TierBreakdown};
pub use dimension::{
    aggregate_axiom, all_named_dimensions, q_score, residual, Axiom, AxiomScore, DimensionScore,
    NAMED_DIMENSION_COUNT, RESIDUAL_NAME, TOTAL_DIMENSION_COUNT, WEIGHT_TEMPLATE,
};
pub use dog::{default_pack, matches_veto_domain, Dog, DogName, HeuristicDog, Vote, Verdict as DogVerdict, VETO_DOMAINS};
pub use env::EnvConfig;
pub use error::{Error, Result};
pub use events::{Bus, BridgeRule, Event, EventFabric, validate_known_kind};
pub use item::{Classification, Complexity, Item, ItemKind};
pub use judgment::{heuristic_scorer, verdict_for, Judgment, JudgmentEngine, JudgmentEngineConfig, Scorer, Verdict};
pub use llm_adapter::{GenerationResult, LlmAdapter, MockLlmAdapter};
pub use orchestrator::{FeedbackOutcome, HealthStatus, JudgmentEnvelope, Orchestrator, OrchestratorConfig};
pub use qlearning::{ActionKey, QEntry, QState, StateKey};
pub use router::{ModelTier, RouteDecision, Router, RouterConfig, Strategy};
pub use store::{JudgmentStore, SqliteJudgmentStore};
pub use track_record::TrackRecord;
pub use worker_pool::{default_pool_size, WorkerPool};
