//! `Item` and `Classification`: the immutable input payload and its derived
//! routing metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// The kind of payload an [`Item`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    CodeReview,
    TokenAnalysis,
    PatternDetection,
    ToolInvocation,
    FreeText,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CodeReview => "code_review",
            Self::TokenAnalysis => "token_analysis",
            Self::PatternDetection => "pattern_detection",
            Self::ToolInvocation => "tool_invocation",
            Self::FreeText => "free_text",
        };
        write!(f, "{s}")
    }
}

/// An opaque, immutable input payload admitted into the orchestrator.
///
/// Items are created once at admission and never mutated; `context` keys are
/// unique, insertion order is not semantically meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub body: String,
    pub context: HashMap<String, Value>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl Item {
    /// Admit a new item. `received_at` is stamped at admission.
    pub fn new(kind: ItemKind, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            body: body.into(),
            context: HashMap::new(),
            user_id: None,
            session_id: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Complexity tiers an [`Item`] may classify into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Epic,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trivial => "trivial",
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Epic => "epic",
        };
        write!(f, "{s}")
    }
}

/// Classification metadata derived from an [`Item`]; never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub domain: String,
    pub complexity: Complexity,
    pub est_cost: f64,
}

impl Classification {
    pub fn new(
        intent: impl Into<String>,
        domain: impl Into<String>,
        complexity: Complexity,
        est_cost: f64,
    ) -> Self {
        Self {
            intent: intent.into(),
            domain: domain.into(),
            complexity,
            est_cost: est_cost.max(0.0),
        }
    }

    /// The canonical Q-state key: `(intent, domain, complexity)`.
    pub fn state_key(&self) -> String {
        format!("{}:{}:{}", self.intent, self.domain, self.complexity)
    }
}
