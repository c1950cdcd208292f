//! The Dog Pack: 11 named voters behind one object-safe trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::item::{Classification, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DogName {
    Guardian,
    Analyst,
    Sage,
    Scout,
    Architect,
    Scholar,
    Janitor,
    Deployer,
    Oracle,
    Cartographer,
    Cynic,
}

impl DogName {
    pub const ALL: [DogName; 11] = [
        DogName::Guardian,
        DogName::Analyst,
        DogName::Sage,
        DogName::Scout,
        DogName::Architect,
        DogName::Scholar,
        DogName::Janitor,
        DogName::Deployer,
        DogName::Oracle,
        DogName::Cartographer,
        DogName::Cynic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DogName::Guardian => "guardian",
            DogName::Analyst => "analyst",
            DogName::Sage => "sage",
            DogName::Scout => "scout",
            DogName::Architect => "architect",
            DogName::Scholar => "scholar",
            DogName::Janitor => "janitor",
            DogName::Deployer => "deployer",
            DogName::Oracle => "oracle",
            DogName::Cartographer => "cartographer",
            DogName::Cynic => "cynic",
        }
    }
}

impl std::fmt::Display for DogName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
    Abstain,
}

/// A single dog's output for one consensus round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub dog: DogName,
    pub verdict: Verdict,
    pub score: f64,
    pub reasoning: String,
    pub weight: f64,
    pub confidence: f64,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn abstain(dog: DogName, reasoning: impl Into<String>) -> Self {
        Self {
            dog,
            verdict: Verdict::Abstain,
            score: 0.0,
            reasoning: reasoning.into(),
            weight: 0.0,
            confidence: 0.0,
            cast_at: Utc::now(),
        }
    }
}

/// Topic patterns the guardian dog vetoes unconditionally.
pub const VETO_DOMAINS: [&str; 3] = ["safety:", "destructive_operation", "high_risk_deployment"];

pub fn matches_veto_domain(topic: &str) -> bool {
    VETO_DOMAINS.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix(':') {
            topic.starts_with(&format!("{prefix}:"))
        } else {
            topic == *pattern || topic.starts_with(pattern)
        }
    })
}

/// One named voter. Object-safe so a `DogPack` can hold a
/// `Vec<Arc<dyn Dog>>` of heterogeneous strategies.
#[async_trait]
pub trait Dog: Send + Sync {
    fn name(&self) -> DogName;

    /// Prior weight this dog places on a domain, in `[0,1]`; used only as a
    /// tie-break hint for the router, never by consensus math itself.
    fn domain_affinity(&self, domain: &str) -> f64 {
        let _ = domain;
        0.5
    }

    async fn vote(
        &self,
        topic: &str,
        item: &Item,
        classification: &Classification,
        deadline: Duration,
    ) -> Result<Vote>;
}

/// A heuristic dog whose verdict is driven entirely by the veto-domain check
/// and a body-length heuristic. Stands in for the LLM-backed scorer the spec
/// treats as opaque (the `Scorer capability` contract: `(dim, item, ctx,
/// deadline) -> score|error`, here specialised to a vote).
pub struct HeuristicDog {
    name: DogName,
    base_score: f64,
}

impl HeuristicDog {
    pub fn new(name: DogName) -> Self {
        let base_score = match name {
            DogName::Guardian => 60.0,
            DogName::Cynic => 45.0,
            DogName::Oracle => 70.0,
            _ => 65.0,
        };
        Self { name, base_score }
    }
}

#[async_trait]
impl Dog for HeuristicDog {
    fn name(&self) -> DogName {
        self.name
    }

    async fn vote(
        &self,
        topic: &str,
        item: &Item,
        _classification: &Classification,
        deadline: Duration,
    ) -> Result<Vote> {
        if deadline.is_zero() {
            return Err(Error::voter_timeout(self.name.to_string(), 0));
        }

        if self.name == DogName::Guardian && matches_veto_domain(topic) {
            return Ok(Vote {
                dog: self.name,
                verdict: Verdict::Reject,
                score: 0.0,
                reasoning: format!("veto: topic '{topic}' matches a guarded domain"),
                weight: 1.0,
                confidence: 1.0,
                cast_at: Utc::now(),
            });
        }

        let length_signal = (item.body.len() as f64 / 400.0).min(1.0);
        let score = (self.base_score + length_signal * 20.0).clamp(0.0, 100.0);
        let verdict = if score >= 50.0 { Verdict::Approve } else { Verdict::Reject };

        Ok(Vote {
            dog: self.name,
            verdict,
            score,
            reasoning: format!("{} heuristic score {score:.1} on topic '{topic}'", self.name),
            weight: 0.0, // filled in by the consensus layer from the dog's track record
            confidence: 0.0,
            cast_at: Utc::now(),
        })
    }
}

/// Build the default 11-dog pack, each a [`HeuristicDog`].
pub fn default_pack() -> Vec<std::sync::Arc<dyn Dog>> {
    DogName::ALL
        .into_iter()
        .map(|n| std::sync::Arc::new(HeuristicDog::new(n)) as std::sync::Arc<dyn Dog>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veto_domains_match_prefixes_and_exact_names() {
        assert!(matches_veto_domain("safety:fs_destructive"));
        assert!(matches_veto_domain("destructive_operation"));
        assert!(matches_veto_domain("high_risk_deployment"));
        assert!(!matches_veto_domain("safe_topic"));
    }

    #[tokio::test]
    async fn guardian_vetoes_matching_topic_regardless_of_body() {
        let dog = HeuristicDog::new(DogName::Guardian);
        let item = Item::new(crate::item::ItemKind::ToolInvocation, "rm -rf /");
        let classification = Classification::new("exec", "fs", crate::item::Complexity::Trivial, 0.0);
        let vote = dog
            .vote("safety:fs_destructive", &item, &classification, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(vote.verdict, Verdict::Reject);
        assert_eq!(vote.dog, DogName::Guardian);
    }

    #[tokio::test]
    async fn zero_deadline_times_out() {
        let dog = HeuristicDog::new(DogName::Analyst);
        let item = Item::new(crate::item::ItemKind::FreeText, "hello");
        let classification = Classification::new("chat", "general", crate::item::Complexity::Trivial, 0.0);
        let result = dog.vote("general", &item, &classification, Duration::ZERO).await;
        assert!(matches!(result, Err(Error::VoterTimeout { .. })));
    }

    #[test]
    fn default_pack_has_eleven_distinct_dogs() {
        let pack = default_pack();
        assert_eq!(pack.len(), 11);
        let mut names: Vec<_> = pack.iter().map(|d| d.name()).collect();
        names.sort_by_key(|n| n.as_str());
        names.dedup();
        assert_eq!(names.len(), 11);
    }
}
