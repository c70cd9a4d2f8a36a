//! Key→document persistence of actor state snapshots (spec.md §4.2 "State
//! store", §6 "State persistence format").

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use actor_rt_core::{ActorId, AdapterResult};

/// Lifecycle status of a persisted actor, per spec.md §6 "State persistence
/// format".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Active,
    Suspended,
    Completed,
    Failed,
}

/// A persisted actor record: `{id, partition_key, actor_type, status, state,
/// correlation_id, created_at, last_activated_at, metadata}` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub actor_id: ActorId,
    pub actor_type: String,
    pub status: ActorStatus,
    pub state: serde_json::Value,
    pub correlation_id: Option<String>,
    pub created_at: i64,
    pub last_activated_at: i64,
    /// May carry the journal itself or a reference to it (spec.md §6).
    pub metadata: serde_json::Value,
}

/// Persistence of actor state, keyed by actor identity. Writes are atomic
/// per actor (spec.md §4.2 "State store").
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, record: StateRecord) -> AdapterResult<()>;

    async fn load(&self, actor_id: &ActorId) -> AdapterResult<Option<StateRecord>>;

    async fn delete(&self, actor_id: &ActorId) -> AdapterResult<()>;

    /// Scan-style lookup by `actor_type`, optionally bounded by `limit`.
    async fn query_by_type(
        &self,
        actor_type: &str,
        limit: Option<usize>,
    ) -> AdapterResult<Vec<StateRecord>>;
}

/// Single-process, in-memory `StateStore` (spec.md §6 "Adapter selection":
/// `inmemory` tag).
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: DashMap<ActorId, StateRecord>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, record: StateRecord) -> AdapterResult<()> {
        self.records.insert(record.actor_id.clone(), record);
        Ok(())
    }

    async fn load(&self, actor_id: &ActorId) -> AdapterResult<Option<StateRecord>> {
        Ok(self.records.get(actor_id).map(|entry| entry.clone()))
    }

    async fn delete(&self, actor_id: &ActorId) -> AdapterResult<()> {
        self.records.remove(actor_id);
        Ok(())
    }

    async fn query_by_type(
        &self,
        actor_type: &str,
        limit: Option<usize>,
    ) -> AdapterResult<Vec<StateRecord>> {
        let mut matches: Vec<StateRecord> = self
            .records
            .iter()
            .filter(|entry| entry.actor_type == actor_type)
            .map(|entry| entry.clone())
            .collect();
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }
}
