//! Ambient Consensus: the streaming, early-exit weighted vote over the Dog
//! Pack.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::constants::{PHI_INV, PHI_INV2, PHI_INV3};
use crate::dog::{matches_veto_domain, Dog, DogName, Verdict, Vote};
use crate::error::Result;
use crate::item::{Classification, Item};
use crate::track_record::TrackRecord;

/// History depth kept per topic: Fib(10).
pub const HISTORY_DEPTH: usize = 55;
/// Minimum non-abstain voters before weighted/simple agreement is evaluated.
pub const MIN_VOTERS_FOR_AGREEMENT: usize = 7;
/// Minimum non-abstain voters for an `approved` outcome.
pub const MIN_VOTERS_FOR_APPROVAL: usize = 3;
pub const EARLY_EXIT_THRESHOLD: f64 = 0.85;
/// Window over which vote anomaly z-scores are computed: Fib(8).
pub const ANOMALY_WINDOW: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Division {
    Unanimous,
    Slight,
    Divided,
    DeeplyDivided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approved,
    Rejected,
    Insufficient,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteAnomaly {
    pub dog: DogName,
    pub z_score: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub consensus_id: uuid::Uuid,
    pub topic: String,
    pub approved: bool,
    pub agreement: f64,
    pub guardian_veto: bool,
    pub votes: Vec<Vote>,
    pub tallies: Tallies,
    pub division: Division,
    pub early_exit: bool,
    pub skipped_voters: usize,
    pub entropy: f64,
    pub prediction: Option<Prediction>,
    pub anomalies: Vec<VoteAnomaly>,
    pub outcome: Outcome,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Tallies {
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted: PredictedOutcome,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictedOutcome {
    Approved,
    Rejected,
    Insufficient,
}

fn division_from_entropy(entropy: f64) -> Division {
    if entropy > PHI_INV {
        Division::DeeplyDivided
    } else if entropy > PHI_INV2 {
        Division::Divided
    } else if entropy > PHI_INV3 {
        Division::Slight
    } else {
        Division::Unanimous
    }
}

/// Shannon entropy of `{approve, reject, abstain}`, normalized to `[0,1]`
/// (divided by `log2(3)`).
fn normalized_entropy(tallies: &Tallies) -> f64 {
    let total = (tallies.approve + tallies.reject + tallies.abstain) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let probs = [tallies.approve, tallies.reject, tallies.abstain]
        .into_iter()
        .map(|c| c as f64 / total)
        .filter(|p| *p > 0.0);
    let h: f64 = probs.map(|p| -p * p.log2()).sum();
    h / 3f64.log2()
}

/// A Markov chain over `(prev_outcome -> current_outcome)` transitions, used
/// purely as an informational prediction — it never short-circuits voting.
#[derive(Debug, Default)]
pub struct MarkovPredictor {
    transitions: HashMap<Outcome, HashMap<Outcome, u64>>,
    last_outcome: Option<Outcome>,
}

impl MarkovPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predict(&self, topic: &str) -> Option<Prediction> {
        let _ = topic;
        let prev = self.last_outcome?;
        let row = self.transitions.get(&prev)?;
        let total: u64 = row.values().sum();
        if total == 0 {
            return None;
        }
        let (best, count) = row.iter().max_by_key(|(_, c)| **c)?;
        let predicted = match best {
            Outcome::Approved => PredictedOutcome::Approved,
            Outcome::Rejected => PredictedOutcome::Rejected,
            Outcome::Insufficient => PredictedOutcome::Insufficient,
        };
        Some(Prediction {
            predicted,
            probability: *count as f64 / total as f64,
        })
    }

    pub fn observe(&mut self, outcome: Outcome) {
        if let Some(prev) = self.last_outcome {
            *self.transitions.entry(prev).or_default().entry(outcome).or_insert(0) += 1;
        }
        self.last_outcome = Some(outcome);
    }
}

struct DogEntry {
    dog: Arc<dyn Dog>,
    track_record: Mutex<TrackRecord>,
    recent_scores: Mutex<VecDeque<f64>>,
}

/// Owns the pack, each dog's track record, and bounded per-topic history.
pub struct DogPack {
    entries: Vec<DogEntry>,
    history: Mutex<HashMap<String, VecDeque<ConsensusResult>>>,
    predictor: Mutex<MarkovPredictor>,
    soft_vote_timeout: Duration,
    global_timeout: Duration,
}

impl DogPack {
    pub fn new(dogs: Vec<Arc<dyn Dog>>) -> Self {
        let entries = dogs
            .into_iter()
            .map(|dog| DogEntry {
                dog,
                track_record: Mutex::new(TrackRecord::default()),
                recent_scores: Mutex::new(VecDeque::with_capacity(ANOMALY_WINDOW)),
            })
            .collect();
        Self {
            entries,
            history: Mutex::new(HashMap::new()),
            predictor: Mutex::new(MarkovPredictor::new()),
            soft_vote_timeout: Duration::from_millis(500),
            global_timeout: Duration::from_millis(1500),
        }
    }

    pub fn with_timeouts(mut self, soft_vote_timeout: Duration, global_timeout: Duration) -> Self {
        self.soft_vote_timeout = soft_vote_timeout;
        self.global_timeout = global_timeout;
        self
    }

    async fn z_score(&self, entry: &DogEntry, score: f64) -> f64 {
        let recent = entry.recent_scores.lock().await;
        if recent.len() < 2 {
            return 0.0;
        }
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let variance = recent.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / recent.len() as f64;
        let sigma = variance.sqrt();
        if sigma < 1e-9 {
            0.0
        } else {
            (score - mean) / sigma
        }
    }

    async fn push_recent(&self, entry: &DogEntry, score: f64) {
        let mut recent = entry.recent_scores.lock().await;
        if recent.len() == ANOMALY_WINDOW {
            recent.pop_front();
        }
        recent.push_back(score);
    }

    /// Run one streaming consensus round over `voter_set` (an ordered subset
    /// of dog names supplied by the Router; empty means "use the whole
    /// pack").
    pub async fn run(
        &self,
        topic: &str,
        item: &Item,
        classification: &Classification,
        voter_set: &[DogName],
    ) -> Result<ConsensusResult> {
        let active: Vec<&DogEntry> = if voter_set.is_empty() {
            self.entries.iter().collect()
        } else {
            self.entries.iter().filter(|e| voter_set.contains(&e.dog.name())).collect()
        };

        let prediction = self.predictor.lock().await.predict(topic);

        let mut votes: Vec<Vote> = Vec::with_capacity(active.len());
        let mut tallies = Tallies::default();
        let mut guardian_veto = false;
        let mut early_exit = false;
        let mut skipped_voters = 0usize;
        let mut anomalies = Vec::new();

        // Each dog votes on its own task so a slow voter never holds up the
        // others; the global deadline races the whole fan-out, not one vote
        // at a time.
        let item_arc = Arc::new(item.clone());
        let classification_arc = Arc::new(classification.clone());
        let topic_owned = topic.to_string();
        let soft_vote_timeout = self.soft_vote_timeout;

        let mut set: JoinSet<Vote> = JoinSet::new();
        for entry in &active {
            let dog = Arc::clone(&entry.dog);
            let item_arc = Arc::clone(&item_arc);
            let classification_arc = Arc::clone(&classification_arc);
            let topic_owned = topic_owned.clone();
            set.spawn(async move {
                let vote_fut = dog.vote(&topic_owned, &item_arc, &classification_arc, soft_vote_timeout);
                match timeout(soft_vote_timeout, vote_fut).await {
                    Ok(Ok(v)) => v,
                    Ok(Err(_)) | Err(_) => Vote::abstain(dog.name(), "vote timed out".into()),
                }
            });
        }

        let deadline_fut = tokio::time::sleep(self.global_timeout);
        tokio::pin!(deadline_fut);

        let mut remaining = active.len();

        'outer: loop {
            if remaining == 0 {
                break;
            }

            let vote = tokio::select! {
                joined = set.join_next() => {
                    match joined {
                        Some(Ok(v)) => {
                            remaining -= 1;
                            v
                        }
                        Some(Err(join_err)) => {
                            remaining -= 1;
                            tracing::warn!(error = %join_err, "dog vote task panicked");
                            continue;
                        }
                        None => break 'outer,
                    }
                }
                _ = &mut deadline_fut => {
                    skipped_voters += remaining;
                    set.abort_all();
                    break 'outer;
                }
            };

            let entry = active.iter().find(|e| e.dog.name() == vote.dog).copied();

            let mut vote = vote;
            if vote.verdict != Verdict::Abstain {
                if let Some(entry) = entry {
                    let track = entry.track_record.lock().await;
                    vote.weight = track.vote_weight();
                    vote.confidence = track.vote_confidence();
                    drop(track);

                    let z = self.z_score(entry, vote.score).await;
                    self.push_recent(entry, vote.score).await;
                    let significant = z.abs() > 2.5;
                    if z.abs() > 1.5 {
                        anomalies.push(VoteAnomaly { dog: entry.dog.name(), z_score: z, significant });
                    }
                }
            }

            match vote.verdict {
                Verdict::Approve => tallies.approve += 1,
                Verdict::Reject => {
                    tallies.reject += 1;
                    if vote.dog == DogName::Guardian && matches_veto_domain(topic) {
                        guardian_veto = true;
                    }
                }
                Verdict::Abstain => tallies.abstain += 1,
            }
            votes.push(vote);

            let non_abstain = tallies.approve + tallies.reject;
            if non_abstain >= MIN_VOTERS_FOR_AGREEMENT {
                let weight_sum: f64 = votes
                    .iter()
                    .filter(|v| v.verdict != Verdict::Abstain)
                    .map(|v| v.weight)
                    .sum();
                let approve_weight: f64 = votes
                    .iter()
                    .filter(|v| v.verdict == Verdict::Approve)
                    .map(|v| v.weight)
                    .sum();
                let reject_weight: f64 = votes
                    .iter()
                    .filter(|v| v.verdict == Verdict::Reject)
                    .map(|v| v.weight)
                    .sum();

                let w_agree = if weight_sum > 0.0 { approve_weight / weight_sum } else { 0.0 };
                let w_disagree = if weight_sum > 0.0 { reject_weight / weight_sum } else { 0.0 };
                let s_agree = tallies.approve as f64 / non_abstain as f64;
                let s_disagree = tallies.reject as f64 / non_abstain as f64;

                let b_agree = 0.7 * w_agree + 0.3 * s_agree;
                let b_disagree = 0.7 * w_disagree + 0.3 * s_disagree;

                if b_agree >= EARLY_EXIT_THRESHOLD || b_disagree >= EARLY_EXIT_THRESHOLD {
                    early_exit = true;
                    skipped_voters += remaining;
                    set.abort_all();
                    break;
                }
            }
        }

        let non_abstain = tallies.approve + tallies.reject;
        let weight_sum: f64 = votes.iter().filter(|v| v.verdict != Verdict::Abstain).map(|v| v.weight).sum();
        let approve_weight: f64 = votes.iter().filter(|v| v.verdict == Verdict::Approve).map(|v| v.weight).sum();
        let w_agree = if weight_sum > 0.0 { approve_weight / weight_sum } else { 0.0 };
        let s_agree = if non_abstain > 0 { tallies.approve as f64 / non_abstain as f64 } else { 0.0 };
        let b_agree = 0.7 * w_agree + 0.3 * s_agree;

        let entropy = normalized_entropy(&tallies);
        let division = division_from_entropy(entropy);

        let approved = !guardian_veto && non_abstain >= MIN_VOTERS_FOR_APPROVAL && b_agree >= PHI_INV;
        let outcome = if guardian_veto {
            Outcome::Rejected
        } else if non_abstain < MIN_VOTERS_FOR_APPROVAL {
            Outcome::Insufficient
        } else if approved {
            Outcome::Approved
        } else {
            Outcome::Rejected
        };

        // Learning update: dogs whose vote matched the final outcome gain
        // alpha, others gain beta. Abstains are not updated.
        for vote in &votes {
            if vote.verdict == Verdict::Abstain {
                continue;
            }
            if let Some(entry) = self.entries.iter().find(|e| e.dog.name() == vote.dog) {
                let matched = matches!(
                    (vote.verdict, outcome),
                    (Verdict::Approve, Outcome::Approved) | (Verdict::Reject, Outcome::Rejected)
                );
                let mut track = entry.track_record.lock().await;
                if matched {
                    track.record_success();
                } else {
                    track.record_failure();
                }
            }
        }
        self.predictor.lock().await.observe(outcome);

        let result = ConsensusResult {
            consensus_id: uuid::Uuid::new_v4(),
            topic: topic.to_string(),
            approved,
            agreement: b_agree,
            guardian_veto,
            votes,
            tallies,
            division,
            early_exit,
            skipped_voters,
            entropy,
            prediction,
            anomalies,
            outcome,
            completed_at: Utc::now(),
        };

        let mut history = self.history.lock().await;
        let topic_history = history.entry(topic.to_string()).or_default();
        if topic_history.len() == HISTORY_DEPTH {
            topic_history.pop_front();
        }
        topic_history.push_back(result.clone());

        Ok(result)
    }

    pub async fn track_record_for(&self, name: DogName) -> Option<TrackRecord> {
        for entry in &self.entries {
            if entry.dog.name() == name {
                return Some(*entry.track_record.lock().await);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dog::default_pack;
    use crate::item::{Complexity, ItemKind};

    fn classification() -> Classification {
        Classification::new("review", "backend", Complexity::Moderate, 0.01)
    }

    #[tokio::test]
    async fn all_dogs_approve_reaches_consensus_with_enough_voters() {
        let pack = DogPack::new(default_pack());
        let item = Item::new(ItemKind::CodeReview, "x".repeat(500));
        let result = pack.run("general:review", &item, &classification(), &[]).await.unwrap();
        assert!(result.tallies.approve + result.tallies.reject >= MIN_VOTERS_FOR_APPROVAL);
    }

    #[tokio::test]
    async fn approved_result_always_satisfies_its_invariants() {
        let pack = DogPack::new(default_pack());
        let item = Item::new(ItemKind::CodeReview, "reviewed, patched, tested, documented");
        let result = pack.run("general:review", &item, &classification(), &[]).await.unwrap();
        if result.approved {
            assert!(!result.guardian_veto);
            let non_abstain = result.tallies.approve + result.tallies.reject;
            assert!(non_abstain >= MIN_VOTERS_FOR_APPROVAL);
            assert!(result.agreement >= PHI_INV - 1e-12);
        }
        if result.early_exit {
            let non_abstain = result.tallies.approve + result.tallies.reject;
            assert!(non_abstain >= MIN_VOTERS_FOR_AGREEMENT);
        }
    }

    #[tokio::test]
    async fn guardian_veto_overrides_agreement() {
        let pack = DogPack::new(default_pack());
        let item = Item::new(ItemKind::ToolInvocation, "rm -rf /".to_string());
        let result = pack
            .run("safety:fs_destructive", &item, &classification(), &[])
            .await
            .unwrap();
        assert!(result.guardian_veto);
        assert!(!result.approved);
        assert_eq!(result.outcome, Outcome::Rejected);
    }

    #[test]
    fn division_bands_match_phi_thresholds() {
        assert_eq!(division_from_entropy(0.0), Division::Unanimous);
        assert_eq!(division_from_entropy(PHI_INV3 + 0.01), Division::Slight);
        assert_eq!(division_from_entropy(PHI_INV2 + 0.01), Division::Divided);
        assert_eq!(division_from_entropy(PHI_INV + 0.01), Division::DeeplyDivided);
    }

    #[test]
    fn entropy_of_unanimous_tally_is_zero() {
        let tallies = Tallies { approve: 10, reject: 0, abstain: 0 };
        assert!(normalized_entropy(&tallies) < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn normalized_entropy_stays_within_unit_bounds(
            approve in 0usize..50,
            reject in 0usize..50,
            abstain in 0usize..50,
        ) {
            let tallies = Tallies { approve, reject, abstain };
            let h = normalized_entropy(&tallies);
            prop_assert!(h >= -1e-9 && h <= 1.0 + 1e-9);
            let _ = division_from_entropy(h);
        }
    }

    #[test]
    fn markov_predictor_has_no_opinion_before_first_observation() {
        let predictor = MarkovPredictor::new();
        assert!(predictor.predict("t").is_none());
    }

    #[test]
    fn markov_predictor_learns_repeating_transition() {
        let mut predictor = MarkovPredictor::new();
        predictor.observe(Outcome::Approved);
        predictor.observe(Outcome::Approved);
        predictor.observe(Outcome::Approved);
        let prediction = predictor.predict("t").unwrap();
        assert_eq!(prediction.predicted, PredictedOutcome::Approved);
    }
}
