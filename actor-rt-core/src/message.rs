//! Message envelope on the wire (spec.md §3 "Message", §6 "Message format").

use serde::{Deserialize, Serialize};

use crate::id::{ActorId, MessageId};
use crate::time::now_ms;

/// What the actor worker should do with a message's payload (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Execute,
    ActivityCompleted,
    ActivityFailed,
    Event,
    Retry,
    Timer,
}

/// End-to-end trace propagation (spec.md §6 "Trace propagation").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub span_id: String,
}

impl Trace {
    /// Start a new span whose parent is this trace's current span, the way
    /// a new message boundary derives its span from the inbound message.
    pub fn child_span(&self, new_span_id: impl Into<String>) -> Trace {
        Trace {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id.into(),
        }
    }
}

/// Delivery metadata attached to every message (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub timestamp: i64,
    pub priority: i32,
    pub ttl_ms: Option<i64>,
    pub retry_count: Option<u32>,
    pub max_retries: Option<u32>,
    pub original_message_id: Option<MessageId>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            timestamp: now_ms(),
            priority: 0,
            ttl_ms: None,
            retry_count: None,
            max_retries: None,
            original_message_id: None,
        }
    }
}

impl MessageMetadata {
    /// True once `timestamp + ttl_ms` has passed, per spec.md §5
    /// "Message TTL, when set, expires the message before dequeue".
    pub fn is_expired(&self, now: i64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now >= self.timestamp + ttl,
            None => false,
        }
    }
}

/// A message addressed to one actor, carrying an opaque application payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub actor_id: ActorId,
    pub message_type: MessageType,
    pub correlation_id: String,
    pub payload: serde_json::Value,
    pub trace: Trace,
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(
        actor_id: ActorId,
        message_type: MessageType,
        correlation_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: MessageId::new(),
            actor_id,
            message_type,
            correlation_id: correlation_id.into(),
            payload,
            trace: Trace::default(),
            metadata: MessageMetadata::default(),
        }
    }

    /// Builds a redelivery copy with an incremented retry count, as used by
    /// the retry handler (spec.md §4.5 `handle_failure`).
    pub fn as_retry(&self, max_retries: u32) -> Message {
        let mut retried = self.clone();
        retried.message_id = MessageId::new();
        retried.message_type = MessageType::Retry;
        retried.metadata.retry_count = Some(self.metadata.retry_count.unwrap_or(0) + 1);
        retried.metadata.max_retries = Some(max_retries);
        retried.metadata.original_message_id = Some(self.message_id);
        retried.metadata.timestamp = now_ms();
        retried
    }
}
