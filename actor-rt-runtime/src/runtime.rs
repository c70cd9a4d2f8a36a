//! The Actor Runtime (spec.md §4.6): pool, lease-gated activation,
//! hydration, eviction, and graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use actor_rt_adapters::{
    ActorStatus, JournalStore, Lease, LockAdapter, MessageQueue, StateRecord, StateStore,
};
use actor_rt_core::{
    now_ms, ActivityInvocationId, ActorId, AdapterError, AdapterResult, Message, RuntimeConfig,
    Snapshot,
};
use actor_rt_engine::{ActorContext, ActorEngine, InvocationOutcome};

use crate::pool::PooledActor;
use crate::registry::ActorTypeRegistry;

/// Which of an actor's entry points to dispatch a message to (spec.md §4.7
/// "dispatch on `msg.message_type`"). `ActivityCompleted`/`ActivityFailed`/
/// `Event` route directly to the matching `resume*` entry point rather than
/// replaying `execute`; an actor that instead prefers the
/// `call_activity`/`await_event` replay style can still get there by having
/// its `resume*` override call back into its own execute-equivalent logic.
#[derive(Debug, Clone)]
pub enum Invocation {
    Execute {
        input: serde_json::Value,
    },
    Event {
        event_type: String,
        data: serde_json::Value,
    },
    ActivityCompleted {
        activity_id: ActivityInvocationId,
        result: serde_json::Value,
    },
    ActivityFailed {
        activity_id: ActivityInvocationId,
        error: String,
    },
}

struct Inner {
    pool: Mutex<HashMap<ActorId, PooledActor>>,
    registry: ActorTypeRegistry,
    state_store: Arc<dyn StateStore>,
    journal_store: Arc<dyn JournalStore>,
    lock: Arc<dyn LockAdapter>,
    queue: Arc<dyn MessageQueue>,
    config: RuntimeConfig,
}

/// Owns the actor pool and drives activation/deactivation against the
/// configured adapters (spec.md §4.6). Cheaply cloneable; every clone shares
/// the same pool and spawned renewal tasks hold their own clone.
#[derive(Clone)]
pub struct ActorRuntime {
    inner: Arc<Inner>,
}

impl ActorRuntime {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        journal_store: Arc<dyn JournalStore>,
        lock: Arc<dyn LockAdapter>,
        queue: Arc<dyn MessageQueue>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: Mutex::new(HashMap::new()),
                registry: ActorTypeRegistry::new(),
                state_store,
                journal_store,
                lock,
                queue,
                config,
            }),
        }
    }

    pub fn register_behavior(
        &self,
        actor_type: impl Into<String>,
        behavior: Arc<dyn actor_rt_engine::ActorBehavior>,
    ) {
        self.inner.registry.register(actor_type, behavior);
    }

    /// `activate(actor_id, actor_type)` (spec.md §4.6 points 1-8).
    pub async fn activate(&self, actor_id: &ActorId, actor_type: &str) -> AdapterResult<()> {
        {
            let mut pool = self.inner.pool.lock().await;
            if let Some(pooled) = pool.get_mut(actor_id) {
                pooled.touch();
                return Ok(());
            }
        }

        let behavior = self.inner.registry.resolve(actor_type).ok_or_else(|| {
            AdapterError::configuration(format!("unknown actor_type '{actor_type}'"))
        })?;

        let lease = self
            .inner
            .lock
            .acquire(&lease_key(actor_id), self.inner.config.lease_ttl)
            .await?
            .ok_or_else(|| AdapterError::lease_contention(actor_id.to_string(), "unknown"))?;

        let stored = self.inner.state_store.load(actor_id).await?;
        let engine = self.hydrate_engine(actor_id, stored.as_ref()).await?;

        let renewal_handle = self.spawn_renewal(actor_id.clone(), lease.clone());

        let pooled = PooledActor {
            engine,
            behavior,
            actor_type: actor_type.to_string(),
            lease,
            last_used_at: Instant::now(),
            renewal_handle,
        };

        let evicted = {
            let mut pool = self.inner.pool.lock().await;
            pool.insert(actor_id.clone(), pooled);
            self.lru_overflow(&pool)
        };
        if let Some(victim) = evicted {
            debug!(actor_id = %victim, "evicting LRU actor to respect max_pool_size");
            self.deactivate(&victim).await?;
        }
        Ok(())
    }

    /// Hydration is driven entirely by the journal (snapshot plus the
    /// entries after it); `state_store` only tells us whether this actor has
    /// ever been activated before (spec.md §4.6 point 6: "hydrate from
    /// journal ... do not replay here" — the actual replay happens inside
    /// `ActorEngine::hydrate`, not in this method).
    async fn hydrate_engine(
        &self,
        actor_id: &ActorId,
        stored: Option<&StateRecord>,
    ) -> AdapterResult<ActorEngine> {
        if stored.is_none() {
            return Ok(ActorEngine::new(actor_id.clone(), serde_json::json!({})));
        }
        let snapshot = self
            .inner
            .journal_store
            .latest_snapshot(actor_id)
            .await?
            .unwrap_or_else(|| Snapshot::empty(serde_json::json!({})));
        let entries = self
            .inner
            .journal_store
            .read(actor_id)
            .await?
            .into_iter()
            .filter(|entry| entry.cursor >= snapshot.cursor)
            .collect();
        Ok(ActorEngine::hydrate(actor_id.clone(), snapshot, entries))
    }

    fn spawn_renewal(&self, actor_id: ActorId, lease: Lease) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        let interval = self.inner.config.lease_renewal_interval;
        let ttl = self.inner.config.lease_ttl;
        tokio::spawn(async move {
            let mut current = lease;
            loop {
                tokio::time::sleep(interval).await;
                match inner.lock.renew(&current, ttl).await {
                    Ok(true) => {
                        current.expires_at = Instant::now() + ttl;
                        debug!(actor_id = %actor_id, "lease renewed");
                    }
                    Ok(false) => {
                        warn!(actor_id = %actor_id, "lease renewal failed, forcing deactivation");
                        force_deactivate(&inner, &actor_id).await;
                        break;
                    }
                    Err(error) => {
                        warn!(actor_id = %actor_id, %error, "lease renewal errored, forcing deactivation");
                        force_deactivate(&inner, &actor_id).await;
                        break;
                    }
                }
            }
        })
    }

    /// Any pooled actor beyond `max_pool_size` (0 = unlimited), chosen by
    /// `last_used_at` (spec.md §4.6 point 8: "evict LRU").
    fn lru_overflow(&self, pool: &HashMap<ActorId, PooledActor>) -> Option<ActorId> {
        let limit = self.inner.config.max_pool_size;
        if limit == 0 || pool.len() <= limit {
            return None;
        }
        pool.iter()
            .min_by_key(|(_, pooled)| pooled.last_used_at)
            .map(|(id, _)| id.clone())
    }

    /// Runs `message_type`'s dispatch against the pooled actor (spec.md §4.7
    /// "dispatch on `msg.message_type`"), persisting new journal entries the
    /// invocation accumulated regardless of outcome.
    pub async fn dispatch(
        &self,
        actor_id: &ActorId,
        correlation_id: &str,
        trace: &actor_rt_core::Trace,
        invocation: Invocation,
    ) -> AdapterResult<InvocationOutcome> {
        let mut pool = self.inner.pool.lock().await;
        let pooled = pool.get_mut(actor_id).ok_or_else(|| {
            AdapterError::configuration(format!("actor '{actor_id}' is not activated"))
        })?;

        let behavior = Arc::clone(&pooled.behavior);
        let outcome = {
            // Record the resumption fact before dispatching, so a behavior
            // that chains a further `call_activity`/`await_event` inside its
            // resume entry point still sees a consistent journal.
            match &invocation {
                Invocation::ActivityCompleted { activity_id, result } => {
                    pooled.engine.record_activity_completed(*activity_id, result.clone());
                }
                Invocation::ActivityFailed { activity_id, error } => {
                    pooled.engine.record_activity_failed(*activity_id, error.clone());
                }
                Invocation::Event { event_type, data } => {
                    pooled.engine.record_event_received(event_type.clone(), data.clone());
                }
                Invocation::Execute { .. } => {}
            }

            let mut ctx = ActorContext::new(&mut pooled.engine, correlation_id, trace);
            let result = match invocation {
                Invocation::Execute { input } => behavior.execute(&mut ctx, input),
                Invocation::Event { event_type, data } => behavior.resume(&mut ctx, &event_type, data),
                Invocation::ActivityCompleted { activity_id, result } => {
                    behavior.resume_with_activity(&mut ctx, activity_id, result)
                }
                Invocation::ActivityFailed { activity_id, error } => {
                    behavior.resume_with_activity_error(&mut ctx, activity_id, &error)
                }
            };
            InvocationOutcome::from_result(result)
        };

        for entry in pooled.engine.new_entries().to_vec() {
            self.inner.journal_store.append(actor_id, entry).await?;
        }
        pooled.engine.mark_committed();

        if pooled.engine.needs_compaction(self.inner.config.compaction_threshold) {
            let snapshot = pooled.engine.compact();
            self.inner
                .journal_store
                .save_snapshot(actor_id, snapshot.clone())
                .await?;
            self.inner.journal_store.trim(actor_id, snapshot.cursor).await?;
        }

        self.inner
            .state_store
            .save(StateRecord {
                actor_id: actor_id.clone(),
                actor_type: pooled.actor_type.clone(),
                status: ActorStatus::Active,
                state: pooled.engine.state().clone(),
                correlation_id: Some(correlation_id.to_string()),
                created_at: now_ms(),
                last_activated_at: now_ms(),
                metadata: serde_json::json!({}),
            })
            .await?;

        Ok(outcome)
    }

    /// `deactivate(actor_id)` (spec.md §4.6): flush state, release the
    /// lease, stop the renewal timer, remove from pool.
    pub async fn deactivate(&self, actor_id: &ActorId) -> AdapterResult<()> {
        let pooled = {
            let mut pool = self.inner.pool.lock().await;
            pool.remove(actor_id)
        };
        let Some(pooled) = pooled else {
            return Ok(());
        };

        self.inner
            .state_store
            .save(StateRecord {
                actor_id: actor_id.clone(),
                actor_type: pooled.actor_type.clone(),
                status: ActorStatus::Suspended,
                state: pooled.engine.state().clone(),
                correlation_id: None,
                created_at: now_ms(),
                last_activated_at: now_ms(),
                metadata: serde_json::json!({}),
            })
            .await?;

        self.inner.lock.release(&pooled.lease).await?;
        info!(actor_id = %actor_id, "actor deactivated");
        Ok(())
    }

    /// `send(actor_id, actor_type, message)` (spec.md §4.6): enqueue onto
    /// `actor:{actor_type}`. The queue name is derived from the message's own
    /// `actor_id`, which already carries its `actor_type`.
    pub async fn send(&self, message: Message) -> AdapterResult<()> {
        let queue_name = message.actor_id.queue_name();
        self.inner.queue.enqueue(&queue_name, message, 0, None, None).await
    }

    /// `evict_idle()` (spec.md §4.6): deactivate anything idle longer than
    /// `max_idle_time`.
    pub async fn evict_idle(&self) -> AdapterResult<()> {
        let idle: Vec<ActorId> = {
            let pool = self.inner.pool.lock().await;
            let now = Instant::now();
            pool.iter()
                .filter(|(_, pooled)| {
                    now.duration_since(pooled.last_used_at) > self.inner.config.max_idle_time
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for actor_id in idle {
            self.deactivate(&actor_id).await?;
        }
        Ok(())
    }

    /// `shutdown()` (spec.md §4.6): deactivate every pooled actor.
    pub async fn shutdown(&self) -> AdapterResult<()> {
        let ids: Vec<ActorId> = {
            let pool = self.inner.pool.lock().await;
            pool.keys().cloned().collect()
        };
        for actor_id in ids {
            self.deactivate(&actor_id).await?;
        }
        Ok(())
    }

    /// Whether `actor_id` currently holds a pooled slot. Exposed mainly for
    /// tests that assert on activation/deactivation/eviction outcomes.
    pub async fn is_pooled(&self, actor_id: &ActorId) -> bool {
        self.inner.pool.lock().await.contains_key(actor_id)
    }
}

/// Discards a pooled actor whose lease renewal failed, without writing its
/// state (spec.md §5 "Lease lifecycle": "the runtime must treat the
/// in-process actor as invalid, discard it without writing state ... and
/// let the next activation reload from storage" — the in-process copy may
/// be stale relative to whatever holds the lease now, so persisting it
/// here could clobber that holder's writes). No `release` either: the
/// lease the renewal attempted to extend is already lost, so releasing it
/// risks releasing another process's legitimately-held lease on the same
/// key if one was already granted.
async fn force_deactivate(inner: &Arc<Inner>, actor_id: &ActorId) {
    let mut pool = inner.pool.lock().await;
    pool.remove(actor_id);
}

fn lease_key(actor_id: &ActorId) -> String {
    actor_id.to_string()
}
