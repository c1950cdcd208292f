//! Unified Orchestrator: the critical-path coordinator plus its detached
//! background tail.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, Semaphore};
use uuid::Uuid;

use crate::classifier::{classify, topic_for};
use crate::consensus::{ConsensusResult, DogPack, Outcome};
use crate::cost_ledger::{BreakerState, CostLedger, CostRecord};
use crate::dimension::{Axiom, AxiomScore};
use crate::error::{Error, Result};
use crate::events::{Bus, Event, EventFabric};
use crate::item::{Classification, Item};
use crate::judgment::{Judgment, JudgmentEngine, Verdict};
use crate::qlearning::{ActionKey, QState, StateKey};
use crate::router::{RouteDecision, Router};
use crate::store::JudgmentStore;

fn default_action_candidates() -> [ActionKey; 3] {
    [
        ActionKey("single".into()),
        ActionKey("consensus".into()),
        ActionKey("dialectic".into()),
    ]
}

/// The Router state/action pair a submission took, kept so a later
/// [`Orchestrator::feedback`] call can update the right Q-table cell.
#[derive(Clone)]
struct JudgmentContext {
    state: StateKey,
    action: ActionKey,
}

/// The full result of one `submit`: a judgment plus whatever of consensus,
/// classification, routing and cost accounting survived to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentEnvelope {
    pub judgment: Option<Judgment>,
    pub consensus: Option<ConsensusResult>,
    pub classification: Option<Classification>,
    pub route_decision: Option<RouteDecision>,
    pub cost_record: Option<CostRecord>,
    pub failed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Correct,
    Incorrect,
    Partial,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub ready: bool,
    pub degraded: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub critical_path_timeout: Duration,
    pub background_concurrency: usize,
}

impl OrchestratorConfig {
    pub fn with_critical_path_timeout(mut self, timeout: Duration) -> Self {
        self.critical_path_timeout = timeout;
        self
    }

    pub fn with_background_concurrency(mut self, concurrency: usize) -> Self {
        self.background_concurrency = concurrency.max(1);
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            critical_path_timeout: Duration::from_secs(3),
            background_concurrency: cpus * 4,
        }
    }
}

struct PendingEntry {
    cancel: Arc<Notify>,
    result: Option<Result<JudgmentEnvelope>>,
}

/// Races `fut` against a cancellation notification; `None` runs uncancellably.
async fn cancellable<T>(cancel: Option<&Notify>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match cancel {
        None => fut.await,
        Some(c) => {
            tokio::select! {
                result = fut => result,
                _ = c.notified() => Err(Error::Cancelled),
            }
        }
    }
}

fn bark_placeholder(item: &Item, reason: &str) -> Judgment {
    Judgment {
        id: Uuid::new_v4(),
        item_id: item.id,
        item_kind: item.kind,
        axiom_scores: Axiom::ALL.map(|a| AxiomScore { axiom: a, value: 0.0 }),
        dimensions: Vec::new(),
        q_score: 0.0,
        verdict: Verdict::Bark,
        confidence: 0.0,
        reasoning_path: vec![format!("classification failed: {reason}")],
        created_at: Utc::now(),
    }
}

fn growl_placeholder(item: &Item, failed: usize, total: usize) -> Judgment {
    Judgment {
        id: Uuid::new_v4(),
        item_id: item.id,
        item_kind: item.kind,
        axiom_scores: Axiom::ALL.map(|a| AxiomScore { axiom: a, value: crate::constants::GROWL_FLOOR }),
        dimensions: Vec::new(),
        q_score: crate::constants::GROWL_FLOOR,
        verdict: Verdict::Growl,
        confidence: crate::constants::PHI_INV2,
        reasoning_path: vec![format!("insufficient signal: {failed}/{total} dimensions failed, consensus skipped")],
        created_at: Utc::now(),
    }
}

/// Owns the critical path (`classify -> route -> judge -> consensus ->
/// format_response`) and the detached background tail (persist, emit
/// `JUDGMENT_CREATED`, debounced Q-state update).
pub struct Orchestrator {
    engine: JudgmentEngine,
    dog_pack: Arc<DogPack>,
    router: Router,
    store: Arc<dyn JudgmentStore>,
    fabric: Arc<EventFabric>,
    ledger: Arc<Mutex<CostLedger>>,
    q_state: Arc<Mutex<QState>>,
    config: OrchestratorConfig,
    background_semaphore: Arc<Semaphore>,
    background: Mutex<tokio::task::JoinSet<()>>,
    judgment_context: Mutex<HashMap<Uuid, JudgmentContext>>,
    pending: Mutex<HashMap<Uuid, PendingEntry>>,
}

impl Orchestrator {
    pub fn new(
        engine: JudgmentEngine,
        dog_pack: Arc<DogPack>,
        router: Router,
        store: Arc<dyn JudgmentStore>,
        fabric: Arc<EventFabric>,
        ledger: CostLedger,
        q_state: QState,
        config: OrchestratorConfig,
    ) -> Self {
        let background_semaphore = Arc::new(Semaphore::new(config.background_concurrency));
        Self {
            engine,
            dog_pack,
            router,
            store,
            fabric,
            ledger: Arc::new(Mutex::new(ledger)),
            q_state: Arc::new(Mutex::new(q_state)),
            config,
            background_semaphore,
            background: Mutex::new(tokio::task::JoinSet::new()),
            judgment_context: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    async fn track_records_snapshot(&self) -> Vec<(crate::dog::DogName, crate::track_record::TrackRecord)> {
        let mut snapshot = Vec::with_capacity(crate::dog::DogName::ALL.len());
        for name in crate::dog::DogName::ALL {
            if let Some(track) = self.dog_pack.track_record_for(name).await {
                snapshot.push((name, track));
            }
        }
        snapshot
    }

    /// Run the synchronous critical path for `item`, bounded by
    /// `config.critical_path_timeout`.
    #[tracing::instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn submit(&self, item: Item) -> Result<JudgmentEnvelope> {
        match tokio::time::timeout(self.config.critical_path_timeout, self.run_critical_path(&item, None)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(self.config.critical_path_timeout.as_millis() as u64)),
        }
    }

    /// Submit for background processing; returns immediately with an id that
    /// [`Orchestrator::poll_async`] and [`Orchestrator::cancel`] key on.
    pub async fn submit_async(self: &Arc<Self>, item: Item) -> Uuid {
        let submission_id = Uuid::new_v4();
        let cancel = Arc::new(Notify::new());
        self.pending.lock().await.insert(
            submission_id,
            PendingEntry { cancel: Arc::clone(&cancel), result: None },
        );

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                orchestrator.config.critical_path_timeout,
                orchestrator.run_critical_path(&item, Some(&cancel)),
            )
            .await
            .unwrap_or_else(|_| Err(Error::timeout(orchestrator.config.critical_path_timeout.as_millis() as u64)));

            if let Some(entry) = orchestrator.pending.lock().await.get_mut(&submission_id) {
                entry.result = Some(result);
            }
        });

        submission_id
    }

    /// Request cancellation of a still-running `submit_async` submission.
    /// A no-op if the submission is unknown or already finished.
    pub async fn cancel(&self, submission_id: Uuid) {
        if let Some(entry) = self.pending.lock().await.get(&submission_id) {
            entry.cancel.notify_one();
        }
    }

    /// Poll a `submit_async` submission. Returns `None` while still running;
    /// consumes the stored result once available.
    pub async fn poll_async(&self, submission_id: Uuid) -> Option<Result<JudgmentEnvelope>> {
        let mut pending = self.pending.lock().await;
        let done = matches!(pending.get(&submission_id), Some(entry) if entry.result.is_some());
        if done {
            pending.remove(&submission_id).and_then(|e| e.result)
        } else {
            None
        }
    }

    /// Fetch a previously persisted judgment by id.
    pub async fn get(&self, judgment_id: Uuid) -> Result<Option<Judgment>> {
        self.store.load_judgment(judgment_id).await
    }

    /// Record an outcome for a previously emitted judgment: feeds the
    /// Router's Q-table an explicit reward in place of the derived one.
    pub async fn feedback(&self, judgment_id: Uuid, outcome: FeedbackOutcome, actual_score: Option<f64>) -> Result<()> {
        let judgment = self
            .store
            .load_judgment(judgment_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("no judgment recorded for id {judgment_id}")))?;

        let reward = match outcome {
            FeedbackOutcome::Correct => 1.0,
            FeedbackOutcome::Incorrect => 0.0,
            FeedbackOutcome::Partial => actual_score.map(|s| (s / 100.0).clamp(0.0, 1.0)).unwrap_or(0.5),
        };

        if let Some(context) = self.judgment_context.lock().await.remove(&judgment.item_id) {
            let mut q_state = self.q_state.lock().await;
            let candidates = default_action_candidates();
            q_state.update(context.state.clone(), context.action, reward, &context.state, &candidates);
        }

        self.fabric
            .emit(Event::new(
                Bus::Core,
                "USER_FEEDBACK",
                serde_json::json!({ "judgment_id": judgment_id, "outcome": format!("{outcome:?}"), "actual_score": actual_score }),
            ))
            .await?;

        Ok(())
    }

    /// Report readiness: degraded when the cost budget is exhausted or the
    /// circuit breaker is not closed.
    pub async fn health(&self) -> HealthStatus {
        let ledger = self.ledger.lock().await;
        let mut reasons = Vec::new();
        if ledger.remaining_budget() <= 0.0 {
            reasons.push("cost budget exhausted".to_string());
        }
        if ledger.breaker_state() != BreakerState::Closed {
            reasons.push(format!("circuit breaker {:?}", ledger.breaker_state()));
        }
        HealthStatus { ready: true, degraded: !reasons.is_empty(), reasons }
    }

    /// Block until all currently spawned background-tail tasks finish, or
    /// `grace_period` elapses — whichever comes first.
    pub async fn shutdown(&self, grace_period: Duration) {
        let mut background = self.background.lock().await;
        let _ = tokio::time::timeout(grace_period, async {
            while background.join_next().await.is_some() {}
        })
        .await;
    }

    async fn run_critical_path(&self, item: &Item, cancel: Option<&Notify>) -> Result<JudgmentEnvelope> {
        let classification = match classify(item) {
            Ok(c) => c,
            Err(e) => {
                let judgment = bark_placeholder(item, &e.to_string());
                self.spawn_background_tail(item.id, judgment.clone(), None, None).await;
                // no route decision was ever reached, so there is no cost to record
                return Ok(JudgmentEnvelope {
                    judgment: Some(judgment),
                    consensus: None,
                    classification: None,
                    route_decision: None,
                    cost_record: None,
                    failed: Some(e.to_string()),
                });
            }
        };

        let track_records = self.track_records_snapshot().await;
        let state = StateKey::new(
            classification.intent.clone(),
            classification.domain.clone(),
            classification.complexity.to_string(),
            Utc::now().hour() as u8,
        );

        let route_decision = {
            let ledger = self.ledger.lock().await;
            let q_state = self.q_state.lock().await;
            let mut rng = rand::thread_rng();
            self.router.route(&classification, &track_records, &q_state, &ledger, &mut rng)
        };

        let action = match route_decision.strategy {
            crate::router::Strategy::Single => ActionKey("single".into()),
            crate::router::Strategy::Consensus => ActionKey("consensus".into()),
            crate::router::Strategy::Dialectic => ActionKey("dialectic".into()),
        };
        self.judgment_context
            .lock()
            .await
            .insert(item.id, JudgmentContext { state, action });

        let _ = self
            .fabric
            .emit(Event::new(
                Bus::Core,
                "ROUTING_DECISION",
                serde_json::json!({
                    "intent": classification.intent,
                    "domain": classification.domain,
                    "complexity": classification.complexity.to_string(),
                    "tier": route_decision.tier,
                    "voter_set": route_decision.voter_set,
                    "explored": route_decision.explored,
                }),
            ))
            .await;

        let judgment = match cancellable(
            cancel,
            self.engine.judge(item, &classification, Some(route_decision.max_dimensions_scored)),
        )
        .await
        {
            Ok(j) => j,
            Err(Error::InsufficientSignal { failed, total }) => {
                let judgment = growl_placeholder(item, failed, total);
                let cost_record = {
                    let mut ledger = self.ledger.lock().await;
                    Some(ledger.record(item.id.to_string(), 0, 0, route_decision.tier, classification.est_cost))
                };
                self.spawn_background_tail(item.id, judgment.clone(), None, cost_record.clone()).await;
                return Ok(JudgmentEnvelope {
                    judgment: Some(judgment),
                    consensus: None,
                    classification: Some(classification),
                    route_decision: Some(route_decision),
                    cost_record,
                    failed: Some("insufficient-signal".into()),
                });
            }
            Err(e) => return Err(e),
        };

        let topic = topic_for(item, &classification);
        let consensus = match cancellable(
            cancel,
            self.dog_pack.run(&topic, item, &classification, &route_decision.voter_set),
        )
        .await
        {
            // Fewer than MIN_VOTERS_FOR_APPROVAL cast a vote: the spec treats
            // this the same as no consensus round having run at all.
            Ok(c) if c.outcome == Outcome::Insufficient => None,
            Ok(c) => Some(c),
            Err(_) => None,
        };

        let cost_record = {
            let mut ledger = self.ledger.lock().await;
            Some(ledger.record(item.id.to_string(), 0, 0, route_decision.tier, classification.est_cost))
        };

        self.spawn_background_tail(item.id, judgment.clone(), consensus.clone(), cost_record.clone())
            .await;

        Ok(JudgmentEnvelope {
            judgment: Some(judgment),
            consensus,
            classification: Some(classification),
            route_decision: Some(route_decision),
            cost_record,
            failed: None,
        })
    }

    /// Detach persistence + event emission onto a semaphore-gated background
    /// task. Store-write happens-before `JUDGMENT_CREATED` emission.
    async fn spawn_background_tail(
        &self,
        item_id: Uuid,
        judgment: Judgment,
        consensus: Option<ConsensusResult>,
        cost_record: Option<CostRecord>,
    ) {
        let store = Arc::clone(&self.store);
        let fabric = Arc::clone(&self.fabric);
        let semaphore = Arc::clone(&self.background_semaphore);
        let q_state = Arc::clone(&self.q_state);

        let task = async move {
            let _permit = semaphore.acquire_owned().await.expect("background semaphore closed");

            if let Err(e) = store.store_judgment(&judgment).await {
                tracing::warn!(error = %e, "background store_judgment failed");
            }
            if let Some(consensus) = &consensus {
                if let Err(e) = store.store_consensus(consensus).await {
                    tracing::warn!(error = %e, "background store_consensus failed");
                }
            }
            if let Some(cost_record) = &cost_record {
                if let Err(e) = store.store_cost_record(cost_record).await {
                    tracing::warn!(error = %e, "background store_cost_record failed");
                }
            }

            let emitted = fabric
                .emit(Event::new(
                    Bus::Core,
                    "JUDGMENT_CREATED",
                    serde_json::json!({
                        "judgment_id": judgment.id,
                        "item_id": item_id,
                        "q_score": judgment.q_score,
                        "verdict": judgment.verdict,
                        "confidence": judgment.confidence,
                    }),
                ))
                .await;
            if let Err(e) = emitted {
                tracing::warn!(error = %e, "JUDGMENT_CREATED emission failed");
            }

            if let Some(consensus) = &consensus {
                let _ = fabric
                    .emit(Event::new(
                        Bus::Agent,
                        "CONSENSUS_REACHED",
                        serde_json::json!({
                            "consensus_id": consensus.consensus_id,
                            "topic": consensus.topic,
                            "approved": consensus.approved,
                            "agreement": consensus.agreement,
                        }),
                    ))
                    .await;
                if consensus.guardian_veto {
                    let _ = fabric
                        .emit(Event::new(
                            Bus::Agent,
                            "CONSENSUS_REJECTED_VETO",
                            serde_json::json!({ "consensus_id": consensus.consensus_id, "topic": consensus.topic }),
                        ))
                        .await;
                }
            }

            let mut guard = q_state.lock().await;
            if guard.is_dirty() {
                guard.mark_persisted();
                if let Err(e) = store.store_q_state(&guard).await {
                    tracing::warn!(error = %e, "background store_q_state failed");
                }
            }
            drop(guard);
        };

        self.background.lock().await.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dog::default_pack;
    use crate::judgment::{heuristic_scorer, JudgmentEngineConfig};
    use crate::cost_ledger::CostLedgerConfig;
    use crate::item::ItemKind;
    use crate::router::RouterConfig;
    use crate::store::SqliteJudgmentStore;
    use crate::worker_pool::WorkerPool;

    fn build(ledger: CostLedger) -> Orchestrator {
        let engine = JudgmentEngine::new(WorkerPool::new(4), heuristic_scorer(), JudgmentEngineConfig::default());
        let dog_pack = Arc::new(DogPack::new(default_pack()));
        let router = Router::new(RouterConfig::default());
        let store: Arc<dyn JudgmentStore> = Arc::new(SqliteJudgmentStore::in_memory().unwrap());
        let fabric = Arc::new(EventFabric::new(32));
        Orchestrator::new(engine, dog_pack, router, store, fabric, ledger, QState::new(), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn submit_produces_a_judgment_for_a_normal_item() {
        let orchestrator = build(CostLedger::new(CostLedgerConfig::default()));
        let item = Item::new(ItemKind::CodeReview, "reviewed, patched, and tested thoroughly");
        let envelope = orchestrator.submit(item).await.unwrap();
        assert!(envelope.judgment.is_some());
        assert!(envelope.failed.is_none());
        orchestrator.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn submit_with_destructive_body_triggers_guardian_veto() {
        let orchestrator = build(CostLedger::new(CostLedgerConfig::default()));
        let item = Item::new(ItemKind::ToolInvocation, "please rm -rf / right now");
        let envelope = orchestrator.submit(item).await.unwrap();
        let consensus = envelope.consensus.expect("consensus should run for a classified item");
        assert!(consensus.guardian_veto);
        assert!(!consensus.approved);
        orchestrator.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn submit_with_empty_body_yields_bark_with_zero_confidence() {
        let orchestrator = build(CostLedger::new(CostLedgerConfig::default()));
        let item = Item::new(ItemKind::FreeText, "   ");
        let envelope = orchestrator.submit(item).await.unwrap();
        let judgment = envelope.judgment.unwrap();
        assert_eq!(judgment.verdict, Verdict::Bark);
        assert_eq!(judgment.confidence, 0.0);
        assert!(envelope.failed.is_some());
    }

    #[tokio::test]
    async fn submit_under_exhausted_budget_still_returns_a_judgment() {
        let ledger = CostLedger::new(CostLedgerConfig { initial_budget: 0.0001, ..Default::default() });
        let orchestrator = build(ledger);
        let item = Item::new(ItemKind::CodeReview, "x".repeat(2500));
        let envelope = orchestrator.submit(item).await.unwrap();
        assert!(envelope.judgment.is_some());
        let decision = envelope.route_decision.unwrap();
        assert_eq!(decision.max_dimensions_scored, 18);
    }

    #[tokio::test]
    async fn submit_async_can_be_polled_to_completion() {
        let orchestrator = Arc::new(build(CostLedger::new(CostLedgerConfig::default())));
        let item = Item::new(ItemKind::CodeReview, "reviewed, patched, and tested thoroughly");
        let submission_id = orchestrator.submit_async(item).await;

        let mut result = None;
        for _ in 0..50 {
            if let Some(r) = orchestrator.poll_async(submission_id).await {
                result = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(result.expect("submission should complete").is_ok());
    }

    #[tokio::test]
    async fn health_reports_degraded_when_budget_is_exhausted() {
        let ledger = CostLedger::new(CostLedgerConfig { initial_budget: 0.0, ..Default::default() });
        let orchestrator = build(ledger);
        let health = orchestrator.health().await;
        assert!(health.degraded);
        assert!(!health.reasons.is_empty());
    }

    #[tokio::test]
    async fn feedback_on_unknown_judgment_fails() {
        let orchestrator = build(CostLedger::new(CostLedgerConfig::default()));
        let result = orchestrator.feedback(Uuid::new_v4(), FeedbackOutcome::Correct, None).await;
        assert!(result.is_err());
    }

    struct FixedScoreDog {
        name: crate::dog::DogName,
        score: f64,
    }

    #[async_trait::async_trait]
    impl crate::dog::Dog for FixedScoreDog {
        fn name(&self) -> crate::dog::DogName {
            self.name
        }

        async fn vote(
            &self,
            _topic: &str,
            _item: &Item,
            _classification: &Classification,
            _deadline: Duration,
        ) -> Result<crate::dog::Vote> {
            Ok(crate::dog::Vote {
                dog: self.name,
                verdict: crate::dog::Verdict::Approve,
                score: self.score,
                reasoning: "seeded fixed vote".into(),
                weight: 0.0,
                confidence: 0.0,
                cast_at: Utc::now(),
            })
        }
    }

    /// S1: all 36 dimensions score in [85,95] and the first 7 of 11 dogs
    /// approve at 74±2, expecting an early-exit HOWL with approved consensus.
    #[tokio::test]
    async fn early_exit_howl_scenario() {
        let fixed_scorer: crate::judgment::Scorer = Arc::new(|dimension: &'static str, _item, _ctx, _deadline| {
            Box::pin(async move {
                use std::collections::hash_map::DefaultHasher;
                use std::hash::{Hash, Hasher};
                let mut hasher = DefaultHasher::new();
                dimension.hash(&mut hasher);
                let bucket = 85.0 + (hasher.finish() % 10) as f64; // 85..95
                Ok(bucket)
            })
        });
        let engine = JudgmentEngine::new(WorkerPool::new(4), fixed_scorer, JudgmentEngineConfig::default());

        let dogs: Vec<Arc<dyn crate::dog::Dog>> = crate::dog::DogName::ALL
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let score = if i < 7 { 74.0 + (i % 2) as f64 - 1.0 } else { 50.0 };
                Arc::new(FixedScoreDog { name, score }) as Arc<dyn crate::dog::Dog>
            })
            .collect();
        let dog_pack = Arc::new(DogPack::new(dogs));

        let router = Router::new(RouterConfig::default());
        let store: Arc<dyn JudgmentStore> = Arc::new(SqliteJudgmentStore::in_memory().unwrap());
        let fabric = Arc::new(EventFabric::new(32));
        let orchestrator = Orchestrator::new(
            engine,
            dog_pack,
            router,
            store,
            fabric,
            CostLedger::new(CostLedgerConfig::default()),
            QState::new(),
            OrchestratorConfig::default(),
        );

        let item = Item::new(ItemKind::CodeReview, "reviewed, patched, tested");
        let envelope = orchestrator.submit(item).await.unwrap();

        let judgment = envelope.judgment.unwrap();
        assert_eq!(judgment.verdict, Verdict::Howl);
        assert!((judgment.q_score - 89.0).abs() < 10.0);

        let consensus = envelope.consensus.unwrap();
        assert!(consensus.approved);
        assert!(consensus.early_exit);
        assert!(consensus.skipped_voters >= 1);
        orchestrator.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn get_after_submit_returns_the_persisted_judgment() {
        let orchestrator = build(CostLedger::new(CostLedgerConfig::default()));
        let item = Item::new(ItemKind::CodeReview, "reviewed, patched, and tested thoroughly");
        let envelope = orchestrator.submit(item).await.unwrap();
        orchestrator.shutdown(Duration::from_secs(1)).await;

        let judgment_id = envelope.judgment.unwrap().id;
        let loaded = orchestrator.get(judgment_id).await.unwrap();
        assert!(loaded.is_some());
    }
}
