//! The Actor Worker: one per `actor_type`, dequeuing from `actor:{type}`
//! and driving each message to completion, suspension, or failure (spec.md
//! §4.7 "Actor Worker").

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use actor_rt_adapters::MessageQueue;
use actor_rt_core::{ActivityInvocationId, AdapterResult, Message, MessageType, RetryPolicy};
use actor_rt_engine::{ActorError, InvocationOutcome};
use actor_rt_wasm::{ActivityExecutor, ActivityJob};

use crate::runtime::{ActorRuntime, Invocation};

/// Default dequeue long-poll timeout (spec.md §4.7 "blocking dequeue").
const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default delay before a lease-contended message is retried (spec.md §4.7
/// "lease contention on activation ... nack with a small delay, not
/// dead-letter").
const LEASE_CONTENTION_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Drives one `actor_type`'s queue: `dequeue` → `process` → `ack` (spec.md
/// §4.7).
pub struct ActorWorker {
    runtime: ActorRuntime,
    queue: Arc<dyn MessageQueue>,
    activity_executor: Arc<ActivityExecutor>,
    actor_type: String,
    dequeue_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl ActorWorker {
    pub fn new(
        runtime: ActorRuntime,
        queue: Arc<dyn MessageQueue>,
        activity_executor: Arc<ActivityExecutor>,
        actor_type: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            runtime,
            queue,
            activity_executor,
            actor_type: actor_type.into(),
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            retry_policy,
        }
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    /// Dequeues and processes a single message, if one is available.
    /// Returns `false` when the dequeue timed out with nothing to do, the
    /// condition a caller can use to decide whether to keep polling.
    pub async fn run_once(&self) -> AdapterResult<bool> {
        let queue_name = format!("actor:{}", self.actor_type);
        let Some(message) = self.queue.dequeue(&queue_name, self.dequeue_timeout).await? else {
            return Ok(false);
        };
        self.process(message).await;
        Ok(true)
    }

    /// Polls forever. Intended to run as its own tokio task per
    /// `actor_type`; errors from an individual `run_once` are logged and
    /// the loop continues rather than exiting the worker.
    pub async fn run(self: Arc<Self>) {
        loop {
            if let Err(error) = self.run_once().await {
                warn!(actor_type = %self.actor_type, %error, "worker dequeue failed");
            }
        }
    }

    /// Polls until `shutdown` fires, then stops dequeuing, drains the pool
    /// by deactivating every actor it still holds, and returns. A watch
    /// channel races against the blocking dequeue, never against a message
    /// already in flight, so a shutdown signal never interrupts a `process`
    /// call partway through.
    ///
    /// `drain_timeout` bounds how long deactivation is allowed to take; if
    /// it elapses first the worker logs and returns anyway; whatever that
    /// left pooled will be recovered by the actor's lease expiring and the
    /// next activation reloading from storage.
    pub async fn run_until_shutdown(
        self: Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<()>,
        drain_timeout: Duration,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.run_once() => {
                    if let Err(error) = result {
                        warn!(actor_type = %self.actor_type, %error, "worker dequeue failed");
                    }
                }
            }
        }

        info!(actor_type = %self.actor_type, "shutdown signal received, draining pool");
        match tokio::time::timeout(drain_timeout, self.runtime.shutdown()).await {
            Ok(Ok(())) => info!(actor_type = %self.actor_type, "worker shutdown complete"),
            Ok(Err(error)) => warn!(actor_type = %self.actor_type, %error, "error draining pool during shutdown"),
            Err(_) => warn!(
                actor_type = %self.actor_type,
                timeout_ms = drain_timeout.as_millis() as u64,
                "worker shutdown timed out, remaining leases will expire on their own"
            ),
        }
    }

    async fn process(&self, message: Message) {
        let actor_id = message.actor_id.clone();

        if let Err(error) = self.runtime.activate(&actor_id, &self.actor_type).await {
            if error.is_lease_contention() {
                info!(actor_id = %actor_id, "lease contention on activation, nacking for later retry");
                self.nack(message, Some(LEASE_CONTENTION_RETRY_DELAY)).await;
            } else if error.is_configuration() {
                warn!(actor_id = %actor_id, %error, "no behavior registered for this actor_type, dead-lettering");
                self.dead_letter(message, "unknown_actor_type").await;
            } else {
                warn!(actor_id = %actor_id, %error, "activation failed, dead-lettering");
                self.dead_letter(message, &format!("activation failed: {error}")).await;
            }
            return;
        }

        let invocation = match to_invocation(&message) {
            Ok(invocation) => invocation,
            Err(reason) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                warn!(actor_id = %actor_id, reason, "unrecognized message, dead-lettering");
                self.dead_letter(message, &reason).await;
                return;
            }
        };

        let outcome = match self
            .runtime
            .dispatch(&actor_id, &message.correlation_id, &message.trace, invocation)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                let retryable = error.is_retryable();
                warn!(actor_id = %actor_id, %error, "dispatch failed at the adapter layer");
                self.handle_failure(message, error.to_string(), retryable).await;
                return;
            }
        };

        match outcome {
            InvocationOutcome::Completed(_result) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                self.ack(message).await;
            }
            InvocationOutcome::SuspendedOnActivity(request) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                let job = ActivityJob {
                    actor_id,
                    correlation_id: message.correlation_id.clone(),
                    activity_id: request.activity_id,
                    activity_name: request.activity_name,
                    activity_version: None,
                    input: request.input,
                    idempotency_key: None,
                };
                self.ack(message).await;
                let executor = Arc::clone(&self.activity_executor);
                tokio::spawn(async move { executor.run(job).await });
            }
            InvocationOutcome::SuspendedOnEvent(_request) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                self.ack(message).await;
            }
            InvocationOutcome::Failed(error) => {
                let _ = self.runtime.deactivate(&actor_id).await;
                let retryable = is_actor_error_retryable(&error);
                self.handle_failure(message, error.to_string(), retryable).await;
            }
        }
    }

    /// Finalizes successful (or non-retryable-terminal) delivery. Per
    /// spec.md §4.7's tie-break, an `ack` failure after successful
    /// processing is only logged — the message is already durably handled
    /// and redelivery would be a harmless duplicate, not data loss.
    async fn ack(&self, message: Message) {
        if let Err(error) = self.queue.ack(&message).await {
            warn!(message_id = %message.message_id, %error, "ack failed after successful processing");
        }
    }

    async fn nack(&self, message: Message, delay: Option<Duration>) {
        if let Err(error) = self.queue.nack(message, delay).await {
            warn!(%error, "nack failed");
        }
    }

    async fn dead_letter(&self, message: Message, reason: &str) {
        if let Err(error) = self.queue.dead_letter(message, reason).await {
            warn!(%error, "dead-letter enqueue failed");
        }
    }

    /// Retries per policy (new message_id, incremented retry count, delayed
    /// redelivery) or dead-letters once retries are exhausted (spec.md
    /// §4.5 `handle_failure`). The original message is only acked once its
    /// replacement (or the dead-letter) is durably enqueued, so a transient
    /// failure here leaves the original to be reclaimed by visibility
    /// timeout instead of silently dropping it.
    async fn handle_failure(&self, message: Message, reason: String, retryable: bool) {
        let retry_count = message.metadata.retry_count.unwrap_or(0);
        let max_retries = message.metadata.max_retries.unwrap_or(self.retry_policy.max_retries);

        if retryable && retry_count < max_retries && self.retry_policy.is_retryable(&reason) {
            let delay = self.retry_policy.backoff_delay_ms(retry_count);
            let retried = message.as_retry(max_retries);
            let queue_name = retried.actor_id.queue_name();
            match self
                .queue
                .enqueue(&queue_name, retried, 0, Some(Duration::from_millis(delay)), None)
                .await
            {
                Ok(()) => self.ack(message).await,
                Err(error) => warn!(%error, "failed to enqueue retry, leaving original for redelivery"),
            }
        } else {
            self.dead_letter(message, &reason).await;
        }
    }
}

fn is_actor_error_retryable(error: &ActorError) -> bool {
    match error {
        ActorError::Adapter(adapter_error) => adapter_error.is_retryable(),
        ActorError::ActivityFailed { .. } => false,
        ActorError::Application { .. } => false,
        ActorError::Suspended(_) => false,
    }
}

fn parse_activity_id(payload: &serde_json::Value) -> Result<ActivityInvocationId, String> {
    payload
        .get("activity_id")
        .cloned()
        .and_then(|value| serde_json::from_value::<ActivityInvocationId>(value).ok())
        .ok_or_else(|| "message is missing a valid activity_id".to_string())
}

fn to_invocation(message: &Message) -> Result<Invocation, String> {
    match message.message_type {
        MessageType::Execute | MessageType::Retry => Ok(Invocation::Execute {
            input: message.payload.clone(),
        }),
        MessageType::Event => {
            let event_type = message.payload["event_type"]
                .as_str()
                .ok_or_else(|| "event message is missing event_type".to_string())?
                .to_string();
            let data = message.payload.get("data").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Invocation::Event { event_type, data })
        }
        MessageType::ActivityCompleted => {
            let activity_id = parse_activity_id(&message.payload)?;
            let result = message.payload.get("result").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Invocation::ActivityCompleted { activity_id, result })
        }
        MessageType::ActivityFailed => {
            let activity_id = parse_activity_id(&message.payload)?;
            let error = message.payload["error"]
                .as_str()
                .unwrap_or("unspecified activity error")
                .to_string();
            Ok(Invocation::ActivityFailed { activity_id, error })
        }
        MessageType::Timer => Err("timer messages are not routed to actor behavior".to_string()),
    }
}
