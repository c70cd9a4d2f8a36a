//! Fingerprint→cached-result with TTL (spec.md §4.2 "Idempotency store").
//!
//! Backs the runtime's strict exactly-once path for activity invocations
//! that attach an `idempotency_key` (spec.md §7 "User-visible behavior").

use dashmap::DashMap;
use async_trait::async_trait;

use actor_rt_core::{ActorId, AdapterResult, MessageId};

/// `{key, actor_id, result, executed_at, expires_at, message_id?}` (spec.md
/// §4.2).
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub actor_id: ActorId,
    pub result: serde_json::Value,
    pub executed_at: i64,
    pub expires_at: i64,
    pub message_id: Option<MessageId>,
}

/// Fingerprint→cached-result with TTL, consulted by the Activity Executor
/// before executing and populated on success (spec.md §4.4, §7).
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, key: &str) -> AdapterResult<Option<IdempotencyRecord>>;

    async fn set(&self, record: IdempotencyRecord) -> AdapterResult<()>;

    async fn delete(&self, key: &str) -> AdapterResult<()>;

    /// Evicts expired records and returns how many were removed.
    async fn cleanup(&self, now: i64) -> AdapterResult<usize>;
}

/// Single-process, in-memory `IdempotencyStore` (spec.md §6 "Adapter
/// selection": `inmemory` tag).
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: DashMap<String, IdempotencyRecord>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &str) -> AdapterResult<Option<IdempotencyRecord>> {
        Ok(self.records.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, record: IdempotencyRecord) -> AdapterResult<()> {
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AdapterResult<()> {
        self.records.remove(key);
        Ok(())
    }

    async fn cleanup(&self, now: i64) -> AdapterResult<usize> {
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            self.records.remove(key);
        }
        Ok(expired.len())
    }
}
