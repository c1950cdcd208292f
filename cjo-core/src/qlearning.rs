//! Q-Learning State: a sparse `(state, action) -> value` table with
//! exploration decay and debounced persistence.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PHI_INV, PHI_INV2, PHI_INV4};

pub const LEARNING_RATE: f64 = PHI_INV; // alpha
pub const DISCOUNT_FACTOR: f64 = PHI_INV2; // gamma
pub const INITIAL_EXPLORATION: f64 = 0.10;
pub const EXPLORATION_DECAY: f64 = 0.99;
pub const EXPLORATION_FLOOR: f64 = PHI_INV4;
pub const CONVERGENCE_VISITS: u64 = 20;
pub const PERSIST_DEBOUNCE: Duration = Duration::from_secs(5);

/// `(intent, domain, complexity, time_of_day_bucket)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub intent: String,
    pub domain: String,
    pub complexity: String,
    pub time_bucket: u8,
}

impl StateKey {
    pub fn new(intent: impl Into<String>, domain: impl Into<String>, complexity: impl Into<String>, hour: u8) -> Self {
        Self {
            intent: intent.into(),
            domain: domain.into(),
            complexity: complexity.into(),
            time_bucket: hour % 24 / 6, // 4 buckets a day
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QEntry {
    pub value: f64,
    pub visits: u64,
    #[serde(skip, default = "Utc::now")]
    pub last_update: DateTime<Utc>,
}

impl Default for QEntry {
    fn default() -> Self {
        Self { value: 0.0, visits: 0, last_update: Utc::now() }
    }
}

/// Sparse Q-table plus a per-state exploration rate and a debounce clock for
/// persistence.
pub struct QState {
    table: HashMap<(StateKey, ActionKey), QEntry>,
    exploration: HashMap<StateKey, f64>,
    dirty: bool,
    #[allow(dead_code)]
    last_persisted: Option<Instant>,
}

impl QState {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            exploration: HashMap::new(),
            dirty: false,
            last_persisted: None,
        }
    }

    pub fn from_entries(entries: Vec<((StateKey, ActionKey), QEntry)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
            exploration: HashMap::new(),
            dirty: false,
            last_persisted: None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&(StateKey, ActionKey), &QEntry)> {
        self.table.iter()
    }

    fn exploration_rate(&self, state: &StateKey) -> f64 {
        *self.exploration.get(state).unwrap_or(&INITIAL_EXPLORATION)
    }

    /// Whether the state has converged: enough visits on its best action and
    /// the exploration roll favors exploitation.
    pub fn has_converged(&self, state: &StateKey, roll: f64) -> bool {
        let max_visits = self
            .table
            .iter()
            .filter(|((s, _), _)| s == state)
            .map(|(_, e)| e.visits)
            .max()
            .unwrap_or(0);
        max_visits >= CONVERGENCE_VISITS && roll > self.exploration_rate(state)
    }

    /// Argmax action for a state among `candidates`; ties broken by first
    /// candidate in iteration order.
    pub fn argmax(&self, state: &StateKey, candidates: &[ActionKey]) -> Option<ActionKey> {
        candidates
            .iter()
            .max_by(|a, b| {
                let va = self.table.get(&(state.clone(), (*a).clone())).map(|e| e.value).unwrap_or(0.0);
                let vb = self.table.get(&(state.clone(), (*b).clone())).map(|e| e.value).unwrap_or(0.0);
                va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// `Q(s,a) <- Q(s,a) + alpha*(r + gamma*max_a' Q(s',a') - Q(s,a))`.
    pub fn update(&mut self, state: StateKey, action: ActionKey, reward: f64, next_state: &StateKey, next_actions: &[ActionKey]) {
        let max_next = next_actions
            .iter()
            .map(|a| self.table.get(&(next_state.clone(), a.clone())).map(|e| e.value).unwrap_or(0.0))
            .fold(f64::MIN, f64::max);
        let max_next = if max_next == f64::MIN { 0.0 } else { max_next };

        let entry = self.table.entry((state.clone(), action)).or_default();
        let td_target = reward + DISCOUNT_FACTOR * max_next;
        entry.value += LEARNING_RATE * (td_target - entry.value);
        entry.visits += 1;
        entry.last_update = Utc::now();

        let rate = self.exploration.entry(state).or_insert(INITIAL_EXPLORATION);
        *rate = (*rate * EXPLORATION_DECAY).max(EXPLORATION_FLOOR);

        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_persisted(&mut self) {
        self.dirty = false;
        self.last_persisted = Some(Instant::now());
    }
}

impl Default for QState {
    fn default() -> Self {
        Self::new()
    }
}
