//! Prompt Classifier: maps an [`Item`] to a [`Classification`].
//!
//! Pattern-matching structure mirrors the query-type classifier this
//! codebase already ships for LLM routing: a handful of compiled regexes
//! checked in order of specificity, falling back to a default bucket.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::item::{Classification, Complexity, Item, ItemKind};

struct IntentPatterns {
    architecture: Regex,
    debugging: Regex,
    destructive: Regex,
}

impl IntentPatterns {
    fn new() -> Self {
        Self {
            architecture: Regex::new(r"(?i)architect|design|refactor|structure|pattern").unwrap(),
            debugging: Regex::new(r"(?i)debug|error|bug|fail|crash|why\s+(does|is)").unwrap(),
            destructive: Regex::new(r"(?i)rm\s+-rf|drop\s+table|force.?push|delete\s+all").unwrap(),
        }
    }
}

fn patterns() -> &'static IntentPatterns {
    static PATTERNS: OnceLock<IntentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(IntentPatterns::new)
}

fn intent_for(body: &str) -> &'static str {
    let p = patterns();
    if p.destructive.is_match(body) {
        "destructive"
    } else if p.architecture.is_match(body) {
        "architecture"
    } else if p.debugging.is_match(body) {
        "debugging"
    } else {
        "general"
    }
}

fn domain_for(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::CodeReview => "code",
        ItemKind::TokenAnalysis => "tokens",
        ItemKind::PatternDetection => "patterns",
        ItemKind::ToolInvocation => "tooling",
        ItemKind::FreeText => "general",
    }
}

fn complexity_for(body: &str, intent: &str) -> Complexity {
    let len = body.len();
    if intent == "destructive" {
        return Complexity::Complex;
    }
    match len {
        0..=40 => Complexity::Trivial,
        41..=160 => Complexity::Simple,
        161..=600 => Complexity::Moderate,
        601..=2000 => Complexity::Complex,
        _ => Complexity::Epic,
    }
}

fn est_cost_for(complexity: Complexity) -> f64 {
    match complexity {
        Complexity::Trivial => 0.002,
        Complexity::Simple => 0.006,
        Complexity::Moderate => 0.015,
        Complexity::Complex => 0.04,
        Complexity::Epic => 0.10,
    }
}

/// Classify an item. The only failure mode is an empty body, which the
/// engine's caller (the Orchestrator) turns into a `BARK` judgment with
/// confidence 0 per the error taxonomy's `classifier-failure` kind.
pub fn classify(item: &Item) -> Result<Classification> {
    if item.body.trim().is_empty() {
        return Err(Error::ClassifierFailure("item body is empty".into()));
    }

    let intent = intent_for(&item.body);
    let domain = domain_for(item.kind);
    let complexity = complexity_for(&item.body, intent);
    let est_cost = est_cost_for(complexity);

    Ok(Classification::new(intent, domain, complexity, est_cost))
}

/// The veto-domain topic string derived from a classification, consumed by
/// the Dog Pack's guardian check.
pub fn topic_for(item: &Item, classification: &Classification) -> String {
    if classification.intent == "destructive" {
        format!("safety:{}", classification.domain)
    } else {
        format!("{}:{}", classification.domain, item.kind)
    }
}
