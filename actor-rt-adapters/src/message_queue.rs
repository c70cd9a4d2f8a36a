//! Durable per-queue FIFO delivery (spec.md §4.1 "Message Queue Adapter").

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use actor_rt_core::{now_ms, AdapterResult, Message};

/// A dead-lettered message with the failure context that routed it here.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: Message,
    pub reason: String,
}

/// Durable, per-queue, at-least-once message delivery with visibility
/// timeout, delayed redelivery, dedup and a dead-letter sink.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// A no-op if `dedup_key` names an already-enqueued or processed message
    /// (spec.md §4.1 "Idempotent enqueue").
    async fn enqueue(
        &self,
        queue: &str,
        message: Message,
        priority: i32,
        delay: Option<Duration>,
        dedup_key: Option<&str>,
    ) -> AdapterResult<()>;

    /// Returns the next available message, marking it invisible for
    /// `visibility_timeout`; `None` on timeout with nothing available.
    async fn dequeue(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> AdapterResult<Option<Message>>;

    /// Finalizes delivery; the message cannot be redelivered.
    async fn ack(&self, message: &Message) -> AdapterResult<()>;

    /// Returns the message to the queue, visible again after `delay`.
    async fn nack(&self, message: Message, delay: Option<Duration>) -> AdapterResult<()>;

    /// Moves the message to a durable poison store with the original payload
    /// and failure context.
    async fn dead_letter(&self, message: Message, reason: &str) -> AdapterResult<()>;
}

#[derive(Debug, Clone)]
struct Pending {
    message: Message,
    priority: i32,
    visible_at: Instant,
}

#[derive(Debug, Clone)]
struct InFlight {
    message: Message,
    priority: i32,
    queue: String,
    deadline: Instant,
}

/// Single-process, in-memory `MessageQueue` for development and testing
/// (spec.md §6 "Adapter selection": `inmemory` tag).
///
/// Ordering within a queue follows enqueue order; `priority` only
/// tie-breaks entries that become visible at the same instant, as required
/// by spec.md §4.1 ("it does not preempt earlier messages of equal
/// priority").
#[derive(Debug, Default)]
pub struct InMemoryMessageQueue {
    queues: DashMap<String, Mutex<VecDeque<Pending>>>,
    dedup_keys: DashMap<String, HashSet<String>>,
    in_flight: DashMap<String, InFlight>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything currently dead-lettered, for test assertions.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    fn dedup_seen(&self, queue: &str, dedup_key: &str) -> bool {
        let mut seen = self.dedup_keys.entry(queue.to_string()).or_default();
        !seen.insert(dedup_key.to_string())
    }

    /// Returns in-flight messages whose visibility timeout has elapsed back
    /// to `queue`'s pending deque, unblocking redelivery (spec.md §4.1
    /// "marking it invisible for the timeout" implies automatic return to
    /// visibility once it elapses, not just on explicit `nack`).
    async fn reclaim_expired(&self, queue: &str) {
        let now = Instant::now();
        let expired_ids: Vec<String> = self
            .in_flight
            .iter()
            .filter(|entry| entry.queue == queue && entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();
        if expired_ids.is_empty() {
            return;
        }
        let entry_queue = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut guard = entry_queue.lock().await;
        for id in expired_ids {
            if let Some((_, in_flight)) = self.in_flight.remove(&id) {
                warn!(
                    message_id = %in_flight.message.message_id,
                    queue,
                    "visibility timeout elapsed, message reclaimed for redelivery"
                );
                guard.push_back(Pending {
                    message: in_flight.message,
                    priority: in_flight.priority,
                    visible_at: now,
                });
            }
        }
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn enqueue(
        &self,
        queue: &str,
        message: Message,
        priority: i32,
        delay: Option<Duration>,
        dedup_key: Option<&str>,
    ) -> AdapterResult<()> {
        if let Some(key) = dedup_key {
            if self.dedup_seen(queue, key) {
                debug!(queue, dedup_key = key, "enqueue deduplicated, treated as success");
                return Ok(());
            }
        }
        let visible_at = match delay {
            Some(d) => Instant::now() + d,
            None => Instant::now(),
        };
        let entry_queue = self
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        entry_queue.lock().await.push_back(Pending {
            message,
            priority,
            visible_at,
        });
        Ok(())
    }

    async fn dequeue(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> AdapterResult<Option<Message>> {
        self.reclaim_expired(queue).await;

        loop {
            let Some(entry_queue) = self.queues.get(queue) else {
                return Ok(None);
            };
            let mut guard = entry_queue.lock().await;
            let now = Instant::now();
            let candidate_index = guard
                .iter()
                .enumerate()
                .filter(|(_, p)| p.visible_at <= now)
                .min_by_key(|(idx, p)| (std::cmp::Reverse(p.priority), *idx))
                .map(|(idx, _)| idx);

            let Some(index) = candidate_index else {
                return Ok(None);
            };
            let Some(pending) = guard.remove(index) else {
                return Ok(None);
            };
            drop(guard);

            // spec.md §5 "Message TTL, when set, expires the message before
            // dequeue": an expired message is dead-lettered instead of being
            // handed to the worker, and the scan continues for the next one.
            if pending.message.metadata.is_expired(now_ms()) {
                warn!(
                    message_id = %pending.message.message_id,
                    queue,
                    "message TTL expired before dequeue, dead-lettering"
                );
                self.dead_letters.lock().await.push(DeadLetter {
                    message: pending.message,
                    reason: "ttl_expired".to_string(),
                });
                continue;
            }

            self.in_flight.insert(
                pending.message.message_id.to_string(),
                InFlight {
                    message: pending.message.clone(),
                    priority: pending.priority,
                    queue: queue.to_string(),
                    deadline: Instant::now() + visibility_timeout,
                },
            );
            return Ok(Some(pending.message));
        }
    }

    async fn ack(&self, message: &Message) -> AdapterResult<()> {
        self.in_flight.remove(&message.message_id.to_string());
        Ok(())
    }

    async fn nack(&self, message: Message, delay: Option<Duration>) -> AdapterResult<()> {
        self.in_flight.remove(&message.message_id.to_string());
        let queue = message.actor_id.queue_name();
        self.enqueue(&queue, message, 0, delay, None).await
    }

    async fn dead_letter(&self, message: Message, reason: &str) -> AdapterResult<()> {
        self.in_flight.remove(&message.message_id.to_string());
        warn!(
            message_id = %message.message_id,
            reason,
            "message moved to dead-letter sink"
        );
        self.dead_letters.lock().await.push(DeadLetter {
            message,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
