//! Drives the real `ActivityExecutor` against small WAT fixtures, covering
//! the concrete scenarios of spec.md §8: an echo activity round-trips
//! through the WASM sandbox, a transient failure retries and then
//! succeeds, and retry exhaustion reports the last error.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use actor_rt_adapters::{
    ActivityDefinition, ActivityLimits, ActivityRegistry, BlobAdapter, InMemoryActivityRegistry,
    InMemoryBlobAdapter, InMemoryIdempotencyStore, InMemoryMessageQueue, MessageQueue,
};
use actor_rt_core::{ActivityInvocationId, ActorId, AdapterResult, MessageType, RetryPolicy, RetryPreset};
use actor_rt_wasm::{ActivityExecutor, ActivityJob};

fn echo_module() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
            (memory (export "memory") 2)
            (global $next (mut i32) (i32.const 1024))
            (func (export "allocate") (param $len i32) (result i32)
                (local $ptr i32)
                (local.set $ptr (global.get $next))
                (global.set $next (i32.add (global.get $next) (local.get $len)))
                (local.get $ptr))
            (func (export "deallocate") (param i32 i32))
            (func (export "execute") (param $ptr i32) (param $len i32) (result i64)
                (i64.or
                    (i64.shl (i64.extend_i32_u (local.get $ptr)) (i64.const 32))
                    (i64.extend_i32_u (local.get $len)))))
        "#,
    )
    .unwrap()
}

/// Returns `{"error":"insufficient funds"}` as valid JSON rather than
/// trapping, exercising the documented application-error convention.
fn application_error_module() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
            (memory (export "memory") 1)
            (data (i32.const 1024) "{\"error\":\"insufficient funds\"}")
            (func (export "allocate") (param i32) (result i32) (i32.const 2048))
            (func (export "deallocate") (param i32 i32))
            (func (export "execute") (param i32 i32) (result i64)
                (i64.or
                    (i64.shl (i64.const 1024) (i64.const 32))
                    (i64.const 30))))
        "#,
    )
    .unwrap()
}

fn trapping_module() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
            (memory (export "memory") 2)
            (func (export "allocate") (param i32) (result i32) (i32.const 1024))
            (func (export "deallocate") (param i32 i32))
            (func (export "execute") (param i32 i32) (result i64) unreachable))
        "#,
    )
    .unwrap()
}

fn definition(blob_path: &str) -> ActivityDefinition {
    ActivityDefinition {
        name: "echo".into(),
        version: "1.0.0".into(),
        blob_path: blob_path.into(),
        limits: ActivityLimits {
            max_memory_mb: 16,
            max_execution_ms: 2_000,
        },
        capabilities: Vec::new(),
    }
}

fn job(actor_id: ActorId) -> ActivityJob {
    ActivityJob {
        actor_id,
        correlation_id: "corr-1".into(),
        activity_id: ActivityInvocationId(0),
        activity_name: "echo".into(),
        activity_version: None,
        input: serde_json::json!({"message": "hi"}),
        idempotency_key: None,
    }
}

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        ..RetryPolicy::preset(RetryPreset::Activity)
    }
}

#[tokio::test]
async fn echo_activity_round_trips_through_the_sandbox() {
    let registry = Arc::new(InMemoryActivityRegistry::new());
    let blobs = Arc::new(InMemoryBlobAdapter::new());
    let queue = Arc::new(InMemoryMessageQueue::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());

    blobs.put("wasm/echo-1.0.0", echo_module()).await.unwrap();
    registry.save(definition("wasm/echo-1.0.0")).await.unwrap();

    let executor = ActivityExecutor::new(
        registry,
        blobs,
        queue.clone(),
        idempotency,
        fast_retry_policy(),
    )
    .unwrap();

    let actor_id = ActorId::new("echoer", "a1");
    executor.run(job(actor_id.clone())).await;

    let delivered = queue
        .dequeue(&actor_id.queue_name(), std::time::Duration::from_secs(5))
        .await
        .unwrap()
        .expect("activity_completed message was enqueued");
    assert_eq!(delivered.message_type, MessageType::ActivityCompleted);
    assert_eq!(delivered.payload["result"], serde_json::json!({"message": "hi"}));
}

#[tokio::test]
async fn transient_compile_failure_retries_then_succeeds() {
    struct FlakyBlob {
        inner: InMemoryBlobAdapter,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlobAdapter for FlakyBlob {
        async fn put(&self, path: &str, bytes: Vec<u8>) -> AdapterResult<()> {
            self.inner.put(path, bytes).await
        }

        async fn get(&self, path: &str) -> AdapterResult<Option<Vec<u8>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Ok(Some(vec![0xde, 0xad, 0xbe, 0xef]));
            }
            self.inner.get(path).await
        }

        async fn exists(&self, path: &str) -> AdapterResult<bool> {
            self.inner.exists(path).await
        }

        async fn delete(&self, path: &str) -> AdapterResult<()> {
            self.inner.delete(path).await
        }
    }

    let registry = Arc::new(InMemoryActivityRegistry::new());
    let blobs = Arc::new(FlakyBlob {
        inner: InMemoryBlobAdapter::new(),
        calls: AtomicUsize::new(0),
    });
    let queue = Arc::new(InMemoryMessageQueue::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());

    blobs.put("wasm/echo-1.0.0", echo_module()).await.unwrap();
    registry.save(definition("wasm/echo-1.0.0")).await.unwrap();

    let executor = ActivityExecutor::new(
        registry,
        blobs.clone(),
        queue.clone(),
        idempotency,
        fast_retry_policy(),
    )
    .unwrap();

    let actor_id = ActorId::new("echoer", "a2");
    executor.run(job(actor_id.clone())).await;

    assert!(blobs.calls.load(Ordering::SeqCst) >= 2, "expected at least one retry");
    let delivered = queue
        .dequeue(&actor_id.queue_name(), std::time::Duration::from_secs(5))
        .await
        .unwrap()
        .expect("activity_completed message was eventually enqueued");
    assert_eq!(delivered.message_type, MessageType::ActivityCompleted);
}

#[tokio::test]
async fn retry_exhaustion_reports_the_last_error() {
    let registry = Arc::new(InMemoryActivityRegistry::new());
    let blobs = Arc::new(InMemoryBlobAdapter::new());
    let queue = Arc::new(InMemoryMessageQueue::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());

    blobs
        .put("wasm/trap-1.0.0", trapping_module())
        .await
        .unwrap();
    registry
        .save(ActivityDefinition {
            name: "echo".into(),
            version: "1.0.0".into(),
            blob_path: "wasm/trap-1.0.0".into(),
            limits: ActivityLimits {
                max_memory_mb: 16,
                max_execution_ms: 2_000,
            },
            capabilities: Vec::new(),
        })
        .await
        .unwrap();

    let policy = RetryPolicy {
        max_retries: 1,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        ..RetryPolicy::preset(RetryPreset::Activity)
    };
    let executor = ActivityExecutor::new(registry, blobs, queue.clone(), idempotency, policy).unwrap();

    let actor_id = ActorId::new("echoer", "a3");
    executor.run(job(actor_id.clone())).await;

    let delivered = queue
        .dequeue(&actor_id.queue_name(), std::time::Duration::from_secs(5))
        .await
        .unwrap()
        .expect("activity_failed message was enqueued after exhausting retries");
    assert_eq!(delivered.message_type, MessageType::ActivityFailed);
    assert!(!delivered.payload["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn json_error_payload_surfaces_as_activity_failed_without_retrying() {
    let registry = Arc::new(InMemoryActivityRegistry::new());
    let blobs = Arc::new(InMemoryBlobAdapter::new());
    let queue = Arc::new(InMemoryMessageQueue::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());

    blobs
        .put("wasm/charge-1.0.0", application_error_module())
        .await
        .unwrap();
    registry
        .save(ActivityDefinition {
            name: "echo".into(),
            version: "1.0.0".into(),
            blob_path: "wasm/charge-1.0.0".into(),
            limits: ActivityLimits {
                max_memory_mb: 16,
                max_execution_ms: 2_000,
            },
            capabilities: Vec::new(),
        })
        .await
        .unwrap();

    // A handled application error is not a transient sandbox failure, so it
    // should not consume any of the policy's retries.
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        ..RetryPolicy::preset(RetryPreset::Activity)
    };
    let executor = ActivityExecutor::new(registry, blobs, queue.clone(), idempotency, policy).unwrap();

    let actor_id = ActorId::new("echoer", "a5");
    executor.run(job(actor_id.clone())).await;

    let delivered = queue
        .dequeue(&actor_id.queue_name(), std::time::Duration::from_secs(5))
        .await
        .unwrap()
        .expect("activity_failed message was enqueued");
    assert_eq!(delivered.message_type, MessageType::ActivityFailed);
    assert_eq!(
        delivered.payload["error"].as_str().unwrap(),
        "activity returned an error payload: insufficient funds"
    );
}

#[tokio::test]
async fn unknown_activity_emits_activity_failed_without_retrying() {
    let registry = Arc::new(InMemoryActivityRegistry::new());
    let blobs = Arc::new(InMemoryBlobAdapter::new());
    let queue = Arc::new(InMemoryMessageQueue::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());

    let executor = ActivityExecutor::new(registry, blobs, queue.clone(), idempotency, fast_retry_policy()).unwrap();
    let actor_id = ActorId::new("echoer", "a4");
    executor.run(job(actor_id.clone())).await;

    let delivered = queue
        .dequeue(&actor_id.queue_name(), std::time::Duration::from_secs(5))
        .await
        .unwrap()
        .expect("activity_failed message was enqueued");
    assert_eq!(delivered.message_type, MessageType::ActivityFailed);
}
