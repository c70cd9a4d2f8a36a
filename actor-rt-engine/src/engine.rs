//! Holds state, journal, and replay bookkeeping for one actor (spec.md
//! §4.3 "Actor Engine").

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use actor_rt_core::{
    now_ms, ActivityInvocationId, ActorId, JournalEntry, JournalEntryKind, Snapshot,
};
use tracing::debug;

use crate::outcome::{ActivityRequest, ActorError, EventRequest, Suspend};

/// Holds one actor's state, the journal entries accumulated since its last
/// snapshot, and the bookkeeping needed to make `call_activity`/
/// `await_event` replay-safe.
///
/// Invariant: `replay()` never performs I/O and never calls into actor
/// behavior code — it only folds recorded state deltas into `state`
/// (spec.md §4.3 "Determinism and replay").
#[derive(Debug)]
pub struct ActorEngine {
    actor_id: ActorId,
    state: serde_json::Value,
    /// Entries since the last snapshot: loaded-from-storage entries followed
    /// by whatever this process has appended.
    journal: Vec<JournalEntry>,
    /// Cursor of the engine's most recent snapshot (0 if none yet).
    snapshot_cursor: u64,
    /// Cursor to assign to the next appended entry.
    next_cursor: u64,
    /// How many of `journal`'s leading entries are already durably
    /// persisted; entries at this index and beyond are new this process.
    committed_len: usize,
    /// Next id `call_activity` will assign. Unlike `journal`, this is never
    /// cleared by `compact()` — it is carried in the `Snapshot` so ids stay
    /// unique for the actor's whole lifetime instead of being recomputed
    /// from whatever the post-snapshot journal happens to hold.
    next_activity_ordinal: u64,
    /// Next ordinal `await_event` will assign, carried the same way.
    next_event_ordinal: u64,
}

impl ActorEngine {
    /// A freshly created actor with no journal history.
    pub fn new(actor_id: ActorId, initial_state: serde_json::Value) -> Self {
        Self {
            actor_id,
            state: initial_state,
            journal: Vec::new(),
            snapshot_cursor: 0,
            next_cursor: 0,
            committed_len: 0,
            next_activity_ordinal: 0,
            next_event_ordinal: 0,
        }
    }

    /// Rehydrates from a snapshot plus the entries recorded after it
    /// (spec.md §4.6 point 6: "hydrate from journal ... do not replay here").
    /// Hydration itself folds `state_changed`/`Unknown{state_delta}` entries
    /// into `state` immediately, since that is the pure, I/O-free part of
    /// replay; it's safe to do eagerly rather than deferring to "the next
    /// invocation path".
    pub fn hydrate(actor_id: ActorId, snapshot: Snapshot, entries: Vec<JournalEntry>) -> Self {
        let mut state = snapshot.state.clone();
        for entry in &entries {
            apply_state_delta(&mut state, &entry.kind);
        }
        let next_cursor = entries
            .last()
            .map(|entry| entry.cursor + 1)
            .unwrap_or(snapshot.cursor);
        let committed_len = entries.len();
        // The post-snapshot entries were appended by a process that kept
        // incrementing these counters past whatever the last persisted
        // snapshot recorded, so take the high-water mark of both rather
        // than trusting the snapshot value alone.
        let next_activity_ordinal = entries
            .iter()
            .filter_map(|entry| match &entry.kind {
                JournalEntryKind::ActivityRequested { activity_id, .. } => Some(activity_id.0 + 1),
                _ => None,
            })
            .max()
            .unwrap_or(snapshot.next_activity_ordinal)
            .max(snapshot.next_activity_ordinal);
        let next_event_ordinal = entries
            .iter()
            .filter_map(|entry| match &entry.kind {
                JournalEntryKind::EventAwaited { ordinal, .. } => Some(ordinal + 1),
                _ => None,
            })
            .max()
            .unwrap_or(snapshot.next_event_ordinal)
            .max(snapshot.next_event_ordinal);
        Self {
            actor_id,
            state,
            journal: entries,
            snapshot_cursor: snapshot.cursor,
            next_cursor,
            committed_len,
            next_activity_ordinal,
            next_event_ordinal,
        }
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn state(&self) -> &serde_json::Value {
        &self.state
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Entries appended by this process that the caller still needs to
    /// persist via the journal store.
    pub fn new_entries(&self) -> &[JournalEntry] {
        &self.journal[self.committed_len..]
    }

    /// Marks every currently-known entry as durably persisted. Called by
    /// the runtime after a successful `journal_store.append` for each of
    /// `new_entries()`.
    pub fn mark_committed(&mut self) {
        self.committed_len = self.journal.len();
    }

    /// True once `journal.len()` crosses `threshold` (spec.md §3
    /// "compaction is triggered when entry count crosses a configured
    /// threshold").
    pub fn needs_compaction(&self, threshold: u64) -> bool {
        self.journal.len() as u64 > threshold
    }

    /// Produces a snapshot at the current cursor and clears the in-memory
    /// journal; the caller persists the snapshot and trims the journal store
    /// at the same cursor (spec.md §4.3 "Compaction").
    pub fn compact(&mut self) -> Snapshot {
        let snapshot = Snapshot::with_ordinals(
            self.state.clone(),
            self.next_cursor,
            now_ms(),
            self.next_activity_ordinal,
            self.next_event_ordinal,
        );
        self.journal.clear();
        self.committed_len = 0;
        self.snapshot_cursor = snapshot.cursor;
        snapshot
    }

    fn append(&mut self, kind: JournalEntryKind) -> JournalEntry {
        let entry = JournalEntry::new(self.next_cursor, now_ms(), kind);
        self.next_cursor += 1;
        self.journal.push(entry.clone());
        entry
    }

    pub(crate) fn update_state(
        &mut self,
        mutator: impl FnOnce(&mut serde_json::Value) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        let mut draft = self.state.clone();
        mutator(&mut draft)?;
        self.state = draft.clone();
        self.append(JournalEntryKind::StateChanged { state: draft });
        Ok(())
    }

    pub(crate) fn call_activity(
        &mut self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActorError> {
        let activity_id = ActivityInvocationId(self.next_activity_ordinal);

        for entry in &self.journal {
            match &entry.kind {
                JournalEntryKind::ActivityCompleted { activity_id: id, result }
                    if *id == activity_id =>
                {
                    debug!(actor_id = %self.actor_id, %activity_id, "call_activity replay hit");
                    return Ok(result.clone());
                }
                JournalEntryKind::ActivityFailed { activity_id: id, error }
                    if *id == activity_id =>
                {
                    return Err(ActorError::ActivityFailed {
                        activity_name: name.to_string(),
                        error: error.clone(),
                    });
                }
                _ => {}
            }
        }

        let input_digest = digest(&input);
        self.next_activity_ordinal += 1;
        self.append(JournalEntryKind::ActivityRequested {
            activity_id,
            name: name.to_string(),
            input_digest,
        });
        Err(Suspend::OnActivity(ActivityRequest {
            activity_id,
            activity_name: name.to_string(),
            input,
        })
        .into())
    }

    pub(crate) fn await_event(&mut self, event_type: &str) -> Result<serde_json::Value, ActorError> {
        let ordinal = self.next_event_ordinal;
        let mut seen = 0u64;
        for entry in &self.journal {
            if let JournalEntryKind::EventReceived { event_type: received_type, data } = &entry.kind {
                if seen == ordinal && received_type == event_type {
                    return Ok(data.clone());
                }
                if received_type == event_type {
                    seen += 1;
                }
            }
        }

        self.next_event_ordinal += 1;
        self.append(JournalEntryKind::EventAwaited {
            event_type: event_type.to_string(),
            ordinal,
        });
        Err(Suspend::OnEvent(EventRequest {
            event_type: event_type.to_string(),
        })
        .into())
    }

    /// Records that `activity_id` finished, for the worker to call before
    /// re-entering `resume_with_activity` (spec.md §4.7).
    pub fn record_activity_completed(
        &mut self,
        activity_id: ActivityInvocationId,
        result: serde_json::Value,
    ) {
        self.append(JournalEntryKind::ActivityCompleted { activity_id, result });
    }

    pub fn record_activity_failed(&mut self, activity_id: ActivityInvocationId, error: String) {
        self.append(JournalEntryKind::ActivityFailed { activity_id, error });
    }

    pub fn record_event_received(&mut self, event_type: String, data: serde_json::Value) {
        self.append(JournalEntryKind::EventReceived { event_type, data });
    }

    pub fn record_invocation(&mut self, message_id: String, message_type: String) {
        self.append(JournalEntryKind::InvocationRecorded {
            message_id,
            message_type,
        });
    }
}

fn apply_state_delta(state: &mut serde_json::Value, kind: &JournalEntryKind) {
    match kind {
        JournalEntryKind::StateChanged { state: new_state } => {
            *state = new_state.clone();
        }
        JournalEntryKind::Unknown {
            state_delta: Some(delta),
            ..
        } => {
            *state = delta.clone();
        }
        _ => {}
    }
}

/// A non-cryptographic content digest of an activity's input, used only to
/// make `activity_requested` entries human-inspectable; it is never
/// compared for correctness (the journal stores the literal result instead).
fn digest(value: &serde_json::Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
