//! The Activity Executor (spec.md §4.4): runs one activity invocation
//! end-to-end and reports its result to the actor's message queue.
//!
//! Instantiation and invocation follow the core `wasmtime::Module`/`Linker`
//! API rather than the Component Model, since this host's ABI (§6) is a raw
//! pointer/length pair rather than a WIT interface, with an async-support +
//! wall-clock-timeout shape wrapped around each call.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};
use wasmtime::{Config, Engine, Linker, Store};

use actor_rt_adapters::{
    ActivityDefinition, ActivityRegistry, BlobAdapter, IdempotencyRecord, IdempotencyStore,
    MessageQueue,
};
use actor_rt_core::{ActivityInvocationId, ActorId, Message, MessageType, RetryPolicy};

use crate::abi::{unpack, ActivityAbi};
use crate::error::WasmActivityError;
use crate::limits::WasmResourceLimiter;
use crate::module_cache::ModuleCache;

/// Everything the Activity Executor needs to run one invocation and route
/// its result, handed to it by the worker when an actor suspends on an
/// activity (spec.md §4.7 "hand off to Activity Executor ... with
/// `(actor_id, actor_type, e)`").
#[derive(Debug, Clone)]
pub struct ActivityJob {
    pub actor_id: ActorId,
    pub correlation_id: String,
    pub activity_id: ActivityInvocationId,
    pub activity_name: String,
    pub activity_version: Option<String>,
    pub input: serde_json::Value,
    pub idempotency_key: Option<String>,
}

/// Runs activity invocations to completion, consulting the retry policy on
/// failure and emitting `activity_completed`/`activity_failed` messages back
/// onto the suspending actor's queue (spec.md §4.4).
pub struct ActivityExecutor {
    module_cache: ModuleCache,
    registry: Arc<dyn ActivityRegistry>,
    blobs: Arc<dyn BlobAdapter>,
    queue: Arc<dyn MessageQueue>,
    idempotency: Arc<dyn IdempotencyStore>,
    retry_policy: RetryPolicy,
}

impl ActivityExecutor {
    pub fn new(
        registry: Arc<dyn ActivityRegistry>,
        blobs: Arc<dyn BlobAdapter>,
        queue: Arc<dyn MessageQueue>,
        idempotency: Arc<dyn IdempotencyStore>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, WasmActivityError> {
        let mut config = Config::new();
        config.async_support(true);
        // CPU-time limiting: wall-clock timeout alone can't stop a module
        // stuck in a loop that never awaits, so meter fuel too.
        config.consume_fuel(true);
        let engine = Engine::new(&config)
            .map_err(|e| WasmActivityError::Compile(format!("engine initialization: {e}")))?;
        Ok(Self {
            module_cache: ModuleCache::new(engine),
            registry,
            blobs,
            queue,
            idempotency,
            retry_policy,
        })
    }

    /// Runs `job` end to end (spec.md §4.4 points 1-6), retrying per policy
    /// and always finishing by emitting exactly one message to the actor's
    /// queue.
    pub async fn run(&self, job: ActivityJob) {
        if let Some(key) = job.idempotency_key.as_deref() {
            if let Ok(Some(cached)) = self.idempotency.get(key).await {
                info!(activity = %job.activity_name, key, "idempotency hit, skipping execution");
                self.emit_completed(&job, cached.result).await;
                return;
            }
        }

        let definition = match self
            .registry
            .resolve(&job.activity_name, job.activity_version.as_deref())
            .await
        {
            Ok(definition) => definition,
            Err(error) => {
                self.emit_failed(&job, error.to_string()).await;
                return;
            }
        };

        let mut attempt = 0u32;
        loop {
            match self.attempt(&definition, &job.input).await {
                Ok(output) => {
                    if let Some(key) = job.idempotency_key.clone() {
                        let _ = self
                            .idempotency
                            .set(IdempotencyRecord {
                                key,
                                actor_id: job.actor_id.clone(),
                                result: output.clone(),
                                executed_at: actor_rt_core::now_ms(),
                                expires_at: actor_rt_core::now_ms() + 24 * 60 * 60 * 1_000,
                                message_id: None,
                            })
                            .await;
                    }
                    self.emit_completed(&job, output).await;
                    return;
                }
                Err(error) => {
                    let error_text = error.to_string();
                    let retryable = error.is_retryable() && self.retry_policy.is_retryable(&error_text);
                    if attempt < self.retry_policy.max_retries && retryable {
                        let delay = self.retry_policy.backoff_delay_ms(attempt);
                        warn!(
                            activity = %job.activity_name,
                            attempt,
                            delay_ms = delay,
                            error = %error_text,
                            "activity attempt failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    self.emit_failed(&job, error_text).await;
                    return;
                }
            }
        }
    }

    /// One compile/instantiate/execute attempt (spec.md §4.4 points 2-4).
    async fn attempt(
        &self,
        definition: &ActivityDefinition,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, WasmActivityError> {
        let module = self
            .module_cache
            .get_or_compile(definition, self.blobs.as_ref())
            .await?;

        let input_bytes = serde_json::to_vec(input)
            .map_err(|e| WasmActivityError::MalformedOutput(e.to_string()))?;
        let timeout_duration = Duration::from_millis(definition.limits.max_execution_ms);

        match timeout(
            timeout_duration,
            invoke(
                self.module_cache.engine().clone(),
                module,
                WasmResourceLimiter::new(&definition.limits),
                crate::limits::fuel_budget(&definition.limits),
                input_bytes,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(WasmActivityError::Timeout {
                limit_ms: definition.limits.max_execution_ms,
            }),
        }
    }

    async fn emit_completed(&self, job: &ActivityJob, result: serde_json::Value) {
        let message = Message::new(
            job.actor_id.clone(),
            MessageType::ActivityCompleted,
            job.correlation_id.clone(),
            serde_json::json!({"activity_id": job.activity_id, "result": result}),
        );
        self.route(job, message).await;
    }

    async fn emit_failed(&self, job: &ActivityJob, error: String) {
        let message = Message::new(
            job.actor_id.clone(),
            MessageType::ActivityFailed,
            job.correlation_id.clone(),
            serde_json::json!({"activity_id": job.activity_id, "error": error}),
        );
        self.route(job, message).await;
    }

    async fn route(&self, job: &ActivityJob, message: Message) {
        let queue_name = job.actor_id.queue_name();
        if let Err(error) = self.queue.enqueue(&queue_name, message, 0, None, None).await {
            warn!(
                activity = %job.activity_name,
                actor_id = %job.actor_id,
                error = %error,
                "failed to route activity result back to actor queue"
            );
        }
    }
}

/// Instantiates `module` in a fresh, memory-capped sandbox and invokes its
/// `execute` export once (spec.md §4.4 points 3-4).
async fn invoke(
    engine: Engine,
    module: Arc<wasmtime::Module>,
    limiter: WasmResourceLimiter,
    fuel: u64,
    input: Vec<u8>,
) -> Result<serde_json::Value, WasmActivityError> {
    let mut store = Store::new(&engine, limiter.into_store_limits());
    store.limiter(|limits| limits);
    store
        .set_fuel(fuel)
        .map_err(|e| WasmActivityError::Instantiate(format!("failed to set fuel budget: {e}")))?;

    let linker = Linker::new(&engine);
    let instance = linker
        .instantiate_async(&mut store, &module)
        .await
        .map_err(|e| WasmActivityError::Instantiate(e.to_string()))?;
    let abi = ActivityAbi::resolve(&mut store, &instance)?;

    let in_len = i32::try_from(input.len())
        .map_err(|_| WasmActivityError::MalformedOutput("input too large to address".into()))?;
    let in_ptr = abi
        .allocate
        .call_async(&mut store, in_len)
        .await
        .map_err(|e| WasmActivityError::Trap(e.to_string()))?;
    abi.memory
        .write(&mut store, in_ptr as usize, &input)
        .map_err(|e| WasmActivityError::Trap(e.to_string()))?;

    let packed = abi
        .execute
        .call_async(&mut store, (in_ptr, in_len))
        .await
        .map_err(|e| WasmActivityError::Trap(e.to_string()))?;
    let (out_ptr, out_len) = unpack(packed);

    let mut output = vec![0u8; out_len.max(0) as usize];
    abi.memory
        .read(&store, out_ptr as usize, &mut output)
        .map_err(|e| WasmActivityError::Trap(e.to_string()))?;

    let _ = abi
        .deallocate
        .call_async(&mut store, (in_ptr, in_len))
        .await;
    let _ = abi
        .deallocate
        .call_async(&mut store, (out_ptr, out_len))
        .await;

    let value: serde_json::Value =
        serde_json::from_slice(&output).map_err(|e| WasmActivityError::MalformedOutput(e.to_string()))?;

    // Activities signal a handled failure without trapping by returning
    // `{"error": "<message>"}` as their JSON payload (spec.md §6).
    if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
        return Err(WasmActivityError::ApplicationError(message.to_string()));
    }

    Ok(value)
}
