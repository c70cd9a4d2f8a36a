//! Append-only event log per actor, plus snapshots and trimming (spec.md
//! §4.2 "Journal store", §8 "Journal monotonicity"/"Snapshot correctness").

use async_trait::async_trait;
use dashmap::DashMap;

use actor_rt_core::{ActorId, AdapterError, AdapterResult, JournalEntry, Snapshot};

/// Append-only per-actor event log. Reads return a defensive copy (spec.md
/// §4.2).
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Invariant: for a given actor, appended cursors strictly increase
    /// (spec.md §8 "Journal monotonicity").
    async fn append(&self, actor_id: &ActorId, entry: JournalEntry) -> AdapterResult<()>;

    async fn read(&self, actor_id: &ActorId) -> AdapterResult<Vec<JournalEntry>>;

    async fn save_snapshot(&self, actor_id: &ActorId, snapshot: Snapshot) -> AdapterResult<()>;

    async fn latest_snapshot(&self, actor_id: &ActorId) -> AdapterResult<Option<Snapshot>>;

    /// Removes entries with `cursor <= before_cursor`; a subsequent `read`
    /// returns only entries with `cursor > before_cursor` (spec.md §8).
    async fn trim(&self, actor_id: &ActorId, before_cursor: u64) -> AdapterResult<()>;

    async fn delete(&self, actor_id: &ActorId) -> AdapterResult<()>;
}

#[derive(Debug, Default)]
struct JournalState {
    entries: Vec<JournalEntry>,
    snapshot: Option<Snapshot>,
}

/// Single-process, in-memory `JournalStore` (spec.md §6 "Adapter selection":
/// `inmemory` tag).
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    journals: DashMap<ActorId, JournalState>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn append(&self, actor_id: &ActorId, entry: JournalEntry) -> AdapterResult<()> {
        let mut state = self.journals.entry(actor_id.clone()).or_default();
        if let Some(last) = state.entries.last() {
            if entry.cursor <= last.cursor {
                return Err(AdapterError::corruption(
                    entry.cursor,
                    format!(
                        "journal cursor must strictly increase: last={}, got={}",
                        last.cursor, entry.cursor
                    ),
                ));
            }
        }
        state.entries.push(entry);
        Ok(())
    }

    async fn read(&self, actor_id: &ActorId) -> AdapterResult<Vec<JournalEntry>> {
        Ok(self
            .journals
            .get(actor_id)
            .map(|state| state.entries.clone())
            .unwrap_or_default())
    }

    async fn save_snapshot(&self, actor_id: &ActorId, snapshot: Snapshot) -> AdapterResult<()> {
        let mut state = self.journals.entry(actor_id.clone()).or_default();
        state.snapshot = Some(snapshot);
        Ok(())
    }

    async fn latest_snapshot(&self, actor_id: &ActorId) -> AdapterResult<Option<Snapshot>> {
        Ok(self
            .journals
            .get(actor_id)
            .and_then(|state| state.snapshot.clone()))
    }

    async fn trim(&self, actor_id: &ActorId, before_cursor: u64) -> AdapterResult<()> {
        if let Some(mut state) = self.journals.get_mut(actor_id) {
            state.entries.retain(|entry| entry.cursor > before_cursor);
        }
        Ok(())
    }

    async fn delete(&self, actor_id: &ActorId) -> AdapterResult<()> {
        self.journals.remove(actor_id);
        Ok(())
    }
}
