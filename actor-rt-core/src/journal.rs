//! Journal entries and snapshots (spec.md §3 "Journal entry"/"Snapshot",
//! §4.3 "Journal entry variants").

use serde::{Deserialize, Serialize};

use crate::id::ActivityInvocationId;

/// One tagged, append-only record in an actor's journal.
///
/// Unknown tags must be tolerated during replay by reapplying any embedded
/// `state_changed` payload and otherwise no-op (spec.md §4.3, last bullet) —
/// modelled here as the `Unknown` variant, which keeps an optional state
/// delta alongside the raw tag so a domain extension's entries still
/// round-trip through storage even though this crate cannot interpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEntryKind {
    /// The actor's state was replaced via a scoped mutation.
    StateChanged { state: serde_json::Value },
    /// `call_activity` was invoked for the first time at this call site.
    ActivityRequested {
        activity_id: ActivityInvocationId,
        name: String,
        input_digest: String,
    },
    /// The activity for `activity_id` completed successfully.
    ActivityCompleted {
        activity_id: ActivityInvocationId,
        result: serde_json::Value,
    },
    /// The activity for `activity_id` failed terminally (retries exhausted).
    ActivityFailed {
        activity_id: ActivityInvocationId,
        error: String,
    },
    /// `await_event` was invoked for the first time at this call site.
    /// `ordinal` is this actor's persistent, ever-increasing await-event
    /// counter value at the time of the call, so it survives compaction
    /// (spec.md §8 "Replay determinism").
    EventAwaited { event_type: String, ordinal: u64 },
    /// An event the actor was awaiting arrived.
    EventReceived {
        event_type: String,
        data: serde_json::Value,
    },
    /// Records which message (and its type) produced this invocation, for
    /// audit and idempotency cross-checks.
    InvocationRecorded {
        message_id: String,
        message_type: String,
    },
    /// A domain extension's entry tag this crate does not interpret. Replay
    /// reapplies `state_delta` if present and otherwise treats it as a no-op.
    Unknown {
        tag: String,
        state_delta: Option<serde_json::Value>,
    },
}

/// A journal entry plus its position in the append-only log.
///
/// Invariant: for a given actor, `cursor` values form a strictly increasing
/// sequence (spec.md §8 "Journal monotonicity").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub cursor: u64,
    pub timestamp: i64,
    pub kind: JournalEntryKind,
}

impl JournalEntry {
    pub fn new(cursor: u64, timestamp: i64, kind: JournalEntryKind) -> Self {
        Self {
            cursor,
            timestamp,
            kind,
        }
    }
}

/// A materialized state at a specific journal cursor (spec.md §3 "Snapshot").
///
/// Invariant: applying the journal entries in `[cursor..end)` to `state`
/// reproduces the actor's current state (spec.md §8 "Snapshot correctness").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: serde_json::Value,
    pub cursor: u64,
    pub timestamp: i64,
    /// Next id `call_activity` will assign. Carried across compaction so
    /// activity ids stay unique for the actor's whole lifetime rather than
    /// being recomputed from whatever the post-snapshot journal happens to
    /// hold (spec.md §8 "Replay determinism").
    #[serde(default)]
    pub next_activity_ordinal: u64,
    /// Next ordinal `await_event` will assign, carried the same way.
    #[serde(default)]
    pub next_event_ordinal: u64,
}

impl Snapshot {
    pub fn new(state: serde_json::Value, cursor: u64, timestamp: i64) -> Self {
        Self::with_ordinals(state, cursor, timestamp, 0, 0)
    }

    /// Like `new`, but also carries the persistent activity/event ordinal
    /// counters forward; used by `ActorEngine::compact` so ids keep
    /// incrementing instead of resetting at each compaction.
    pub fn with_ordinals(
        state: serde_json::Value,
        cursor: u64,
        timestamp: i64,
        next_activity_ordinal: u64,
        next_event_ordinal: u64,
    ) -> Self {
        Self {
            state,
            cursor,
            timestamp,
            next_activity_ordinal,
            next_event_ordinal,
        }
    }

    /// A snapshot standing in for "no history yet": empty state at cursor 0.
    pub fn empty(initial_state: serde_json::Value) -> Self {
        Self::new(initial_state, 0, crate::time::now_ms())
    }
}
