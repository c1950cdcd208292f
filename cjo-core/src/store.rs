//! `JudgmentStore`: the opaque persistence seam, plus a `rusqlite`-backed
//! reference implementation grounded on this codebase's existing
//! `SqliteMemoryStore` (`with_conn` helper, `Arc<Mutex<Connection>>`).

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusResult;
use crate::cost_ledger::CostRecord;
use crate::error::{Error, Result};
use crate::judgment::Judgment;
use crate::qlearning::{ActionKey, QEntry, QState, StateKey};

/// Persistence seam consumed by the Orchestrator's background tail. All
/// operations are best-effort in the caller's sense (retried with backoff
/// by the caller); the store itself just reports success or failure.
#[async_trait]
pub trait JudgmentStore: Send + Sync {
    async fn store_judgment(&self, judgment: &Judgment) -> Result<()>;
    async fn load_judgment(&self, judgment_id: uuid::Uuid) -> Result<Option<Judgment>>;
    async fn store_consensus(&self, consensus: &ConsensusResult) -> Result<()>;
    async fn store_cost_record(&self, record: &CostRecord) -> Result<()>;
    async fn load_q_state(&self) -> Result<Option<Vec<((StateKey, ActionKey), QEntry)>>>;
    async fn store_q_state(&self, q_state: &QState) -> Result<()>;
}

/// Reference implementation. Not a specified feature — exists so the crate
/// is runnable and testable standalone.
pub struct SqliteJudgmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJudgmentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::StoreFailure(e.to_string()))?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::StoreFailure(e.to_string()))?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS judgments (
                    id TEXT PRIMARY KEY,
                    item_id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS consensus_results (
                    consensus_id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS cost_records (
                    op_id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS q_state (
                    id INTEGER PRIMARY KEY CHECK (id = 0),
                    body TEXT NOT NULL
                );",
            )
            .map_err(|e| Error::StoreFailure(e.to_string()))
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| Error::StoreFailure("poisoned connection mutex".into()))?;
        f(&conn)
    }
}

#[derive(Serialize, Deserialize)]
struct QStateRow {
    entries: Vec<((StateKey, ActionKey), QEntry)>,
}

#[async_trait]
impl JudgmentStore for SqliteJudgmentStore {
    async fn store_judgment(&self, judgment: &Judgment) -> Result<()> {
        let body = serde_json::to_string(judgment)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO judgments (id, item_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    judgment.id.to_string(),
                    judgment.item_id.to_string(),
                    body,
                    judgment.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| Error::StoreFailure(e.to_string()))?;
            Ok(())
        })
    }

    async fn load_judgment(&self, judgment_id: uuid::Uuid) -> Result<Option<Judgment>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM judgments WHERE id = ?1")
                .map_err(|e| Error::StoreFailure(e.to_string()))?;
            let mut rows = stmt
                .query(params![judgment_id.to_string()])
                .map_err(|e| Error::StoreFailure(e.to_string()))?;
            if let Some(row) = rows.next().map_err(|e| Error::StoreFailure(e.to_string()))? {
                let body: String = row.get(0).map_err(|e| Error::StoreFailure(e.to_string()))?;
                let judgment: Judgment = serde_json::from_str(&body)?;
                Ok(Some(judgment))
            } else {
                Ok(None)
            }
        })
    }

    async fn store_consensus(&self, consensus: &ConsensusResult) -> Result<()> {
        let body = serde_json::to_string(consensus)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO consensus_results (consensus_id, body) VALUES (?1, ?2)",
                params![consensus.consensus_id.to_string(), body],
            )
            .map_err(|e| Error::StoreFailure(e.to_string()))?;
            Ok(())
        })
    }

    async fn store_cost_record(&self, record: &CostRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cost_records (op_id, body) VALUES (?1, ?2)",
                params![record.op_id, body],
            )
            .map_err(|e| Error::StoreFailure(e.to_string()))?;
            Ok(())
        })
    }

    async fn load_q_state(&self) -> Result<Option<Vec<((StateKey, ActionKey), QEntry)>>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM q_state WHERE id = 0")
                .map_err(|e| Error::StoreFailure(e.to_string()))?;
            let mut rows = stmt.query([]).map_err(|e| Error::StoreFailure(e.to_string()))?;
            if let Some(row) = rows.next().map_err(|e| Error::StoreFailure(e.to_string()))? {
                let body: String = row.get(0).map_err(|e| Error::StoreFailure(e.to_string()))?;
                let parsed: QStateRow = serde_json::from_str(&body)?;
                Ok(Some(parsed.entries))
            } else {
                Ok(None)
            }
        })
    }

    async fn store_q_state(&self, q_state: &QState) -> Result<()> {
        let entries: Vec<((StateKey, ActionKey), QEntry)> =
            q_state.entries().map(|(k, v)| (k.clone(), *v)).collect();
        let body = serde_json::to_string(&QStateRow { entries })?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO q_state (id, body) VALUES (0, ?1)",
                params![body],
            )
            .map_err(|e| Error::StoreFailure(e.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{AxiomScore, Axiom};
    use crate::judgment::Verdict as JudgmentVerdict;
    use crate::item::ItemKind;

    fn sample_judgment() -> Judgment {
        let axiom_scores: [AxiomScore; 5] = Axiom::ALL.map(|a| AxiomScore { axiom: a, value: 90.0 });
        Judgment {
            id: uuid::Uuid::new_v4(),
            item_id: uuid::Uuid::new_v4(),
            item_kind: ItemKind::CodeReview,
            axiom_scores,
            dimensions: Vec::new(),
            q_score: 90.0,
            verdict: JudgmentVerdict::Howl,
            confidence: 0.5,
            reasoning_path: vec!["seed test".into()],
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn store_then_load_round_trips_core_fields() {
        let store = SqliteJudgmentStore::in_memory().unwrap();
        let judgment = sample_judgment();
        store.store_judgment(&judgment).await.unwrap();
        let loaded = store.load_judgment(judgment.id).await.unwrap().unwrap();
        assert_eq!(loaded.q_score, judgment.q_score);
        assert_eq!(loaded.verdict, judgment.verdict);
    }

    #[tokio::test]
    async fn load_missing_judgment_returns_none() {
        let store = SqliteJudgmentStore::in_memory().unwrap();
        assert!(store.load_judgment(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn q_state_store_and_load_is_idempotent_modulo_timestamps() {
        let store = SqliteJudgmentStore::in_memory().unwrap();
        let mut q = QState::new();
        let state = StateKey::new("review", "code", "moderate", 10);
        let action = ActionKey("consensus".into());
        q.update(state.clone(), action.clone(), 1.0, &state, &[]);

        store.store_q_state(&q).await.unwrap();
        let reloaded = store.load_q_state().await.unwrap().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].0 .0, state);
    }
}
