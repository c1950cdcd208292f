//! Event Fabric: three logical buses, a middleware chain on Core, and a
//! loop-safe bridge between buses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bus {
    Core,
    Automation,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub bus: Bus,
    pub kind: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
    pub correlation_id: uuid::Uuid,
}

impl Event {
    pub fn new(bus: Bus, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            bus,
            kind: kind.into(),
            payload,
            emitted_at: Utc::now(),
            correlation_id: uuid::Uuid::new_v4(),
        }
    }

    fn visited_key(&self) -> VisitedKey {
        let mut hasher = Sha256::new();
        hasher.update(self.payload.to_string().as_bytes());
        let digest = hasher.finalize();
        VisitedKey {
            bus: self.bus,
            kind: self.kind.clone(),
            payload_hash: format!("{digest:x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VisitedKey {
    bus: Bus,
    kind: String,
    payload_hash: String,
}

const VISITED_TTL: Duration = Duration::from_secs(1);

/// One named forwarding rule: `(from_bus, from_kind) -> (to_bus, to_kind)`,
/// with an optional payload transform.
pub struct BridgeRule {
    pub from_bus: Bus,
    pub from_kind: String,
    pub to_bus: Bus,
    pub to_kind: String,
    pub transform: Arc<dyn Fn(&serde_json::Value) -> serde_json::Value + Send + Sync>,
}

impl BridgeRule {
    pub fn identity(from_bus: Bus, from_kind: impl Into<String>, to_bus: Bus, to_kind: impl Into<String>) -> Self {
        Self {
            from_bus,
            from_kind: from_kind.into(),
            to_bus,
            to_kind: to_kind.into(),
            transform: Arc::new(|payload| payload.clone()),
        }
    }
}

type Middleware = Arc<dyn Fn(&Event) -> Result<Event> + Send + Sync>;

/// One broadcast channel per logical bus, plus Core's middleware chain and
/// the bridge's visited-set loop prevention.
pub struct EventFabric {
    core: broadcast::Sender<Event>,
    automation: broadcast::Sender<Event>,
    agent: broadcast::Sender<Event>,
    core_middleware: Vec<Middleware>,
    rules: Vec<BridgeRule>,
    visited: Mutex<HashMap<VisitedKey, Instant>>,
    bus_loop_suppressions: std::sync::atomic::AtomicU64,
}

impl EventFabric {
    pub fn new(capacity: usize) -> Self {
        Self {
            core: broadcast::channel(capacity).0,
            automation: broadcast::channel(capacity).0,
            agent: broadcast::channel(capacity).0,
            core_middleware: Vec::new(),
            rules: Vec::new(),
            visited: Mutex::new(HashMap::new()),
            bus_loop_suppressions: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn with_core_middleware(mut self, middleware: Middleware) -> Self {
        self.core_middleware.push(middleware);
        self
    }

    pub fn with_rule(mut self, rule: BridgeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn subscribe(&self, bus: Bus) -> broadcast::Receiver<Event> {
        match bus {
            Bus::Core => self.core.subscribe(),
            Bus::Automation => self.automation.subscribe(),
            Bus::Agent => self.agent.subscribe(),
        }
    }

    fn sender(&self, bus: Bus) -> &broadcast::Sender<Event> {
        match bus {
            Bus::Core => &self.core,
            Bus::Automation => &self.automation,
            Bus::Agent => &self.agent,
        }
    }

    /// Publish an event; non-blocking from the publisher's perspective.
    /// Subscriber errors never propagate here (the bus itself does no
    /// dispatch work beyond the broadcast channel send).
    pub async fn emit(&self, mut event: Event) -> Result<()> {
        if event.bus == Bus::Core {
            for mw in &self.core_middleware {
                event = mw(&event)?;
            }
        }

        let sender = self.sender(event.bus);
        let _ = sender.send(event.clone());

        self.forward(event).await;
        Ok(())
    }

    fn forward<'a>(&'a self, event: Event) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let matching: Vec<&BridgeRule> = self
                .rules
                .iter()
                .filter(|r| r.from_bus == event.bus && r.from_kind == event.kind)
                .collect();
            if matching.is_empty() {
                return;
            }

            let key = event.visited_key();
            {
                let mut visited = self.visited.lock().await;
                visited.retain(|_, inserted_at| inserted_at.elapsed() < VISITED_TTL);
                if visited.contains_key(&key) {
                    self.bus_loop_suppressions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return;
                }
                visited.insert(key, Instant::now());
            }

            for rule in matching {
                let payload = (rule.transform)(&event.payload);
                let forwarded = Event::new(rule.to_bus, rule.to_kind.clone(), payload);
                let sender = self.sender(rule.to_bus);
                let _ = sender.send(forwarded.clone());
                self.forward(forwarded).await;
            }
        })
    }

    pub fn bus_loop_suppressions(&self) -> u64 {
        self.bus_loop_suppressions.load(std::sync::atomic::Ordering::Relaxed)
    }
}

pub fn validate_known_kind(known_kinds: &'static [&'static str]) -> Middleware {
    Arc::new(move |event: &Event| {
        if known_kinds.contains(&event.kind.as_str()) {
            Ok(event.clone())
        } else {
            Err(Error::Internal(format!("unknown event kind '{}'", event.kind)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_delivers_to_subscriber() {
        let fabric = EventFabric::new(16);
        let mut rx = fabric.subscribe(Bus::Core);
        fabric.emit(Event::new(Bus::Core, "TEST", serde_json::json!({}))).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, "TEST");
    }

    #[tokio::test]
    async fn bridge_forwards_once_within_ttl_then_suppresses_duplicate() {
        let fabric = EventFabric::new(16)
            .with_rule(BridgeRule::identity(Bus::Core, "A", Bus::Agent, "B"));
        let mut agent_rx = fabric.subscribe(Bus::Agent);

        fabric.emit(Event::new(Bus::Core, "A", serde_json::json!({"x": 1}))).await.unwrap();
        fabric.emit(Event::new(Bus::Core, "A", serde_json::json!({"x": 1}))).await.unwrap();

        let first = agent_rx.recv().await.unwrap();
        assert_eq!(first.kind, "B");
        let second = tokio::time::timeout(Duration::from_millis(50), agent_rx.recv()).await;
        assert!(second.is_err(), "duplicate forward should have been suppressed");
        assert_eq!(fabric.bus_loop_suppressions(), 1);
    }

    #[tokio::test]
    async fn bidirectional_bridge_forwards_each_direction_exactly_once() {
        let fabric = EventFabric::new(16)
            .with_rule(BridgeRule::identity(Bus::Core, "A", Bus::Agent, "B"))
            .with_rule(BridgeRule::identity(Bus::Agent, "B", Bus::Core, "A"));
        let mut core_rx = fabric.subscribe(Bus::Core);
        let mut agent_rx = fabric.subscribe(Bus::Agent);

        fabric.emit(Event::new(Bus::Core, "A", serde_json::json!({}))).await.unwrap();

        let agent_event = agent_rx.recv().await.unwrap();
        assert_eq!(agent_event.kind, "B");

        // Forwarding B back onto Core:A re-hits the already-visited key for
        // the original A payload, so the bounce is suppressed: exactly one
        // hop in each direction, never a cascade.
        let cascade = tokio::time::timeout(Duration::from_millis(50), core_rx.recv()).await;
        assert!(cascade.is_err());
        assert_eq!(fabric.bus_loop_suppressions(), 1);
    }

    #[tokio::test]
    async fn visited_key_expires_after_ttl_allowing_a_later_duplicate() {
        let fabric = EventFabric::new(16)
            .with_rule(BridgeRule::identity(Bus::Core, "A", Bus::Agent, "B"));
        let mut agent_rx = fabric.subscribe(Bus::Agent);

        fabric.emit(Event::new(Bus::Core, "A", serde_json::json!({"x": 1}))).await.unwrap();
        agent_rx.recv().await.unwrap();

        tokio::time::sleep(VISITED_TTL + Duration::from_millis(50)).await;

        fabric.emit(Event::new(Bus::Core, "A", serde_json::json!({"x": 1}))).await.unwrap();
        let second = agent_rx.recv().await.unwrap();
        assert_eq!(second.kind, "B");
        assert_eq!(fabric.bus_loop_suppressions(), 0);
    }

    #[tokio::test]
    async fn middleware_rejects_unknown_kind() {
        static KNOWN: &[&str] = &["JUDGMENT_CREATED"];
        let fabric = EventFabric::new(16).with_core_middleware(validate_known_kind(KNOWN));
        let result = fabric.emit(Event::new(Bus::Core, "MYSTERY", serde_json::json!({}))).await;
        assert!(result.is_err());
    }
}
