//! The pool entry for one active actor (spec.md §4.6 "a pool mapping
//! `actor_id → (actor, last_used_at, lease)`").

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use actor_rt_adapters::Lease;
use actor_rt_engine::{ActorBehavior, ActorEngine};

pub(crate) struct PooledActor {
    pub engine: ActorEngine,
    pub behavior: Arc<dyn ActorBehavior>,
    pub actor_type: String,
    pub lease: Lease,
    pub last_used_at: Instant,
    pub renewal_handle: JoinHandle<()>,
}

impl PooledActor {
    pub fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }
}

impl Drop for PooledActor {
    fn drop(&mut self) {
        self.renewal_handle.abort();
    }
}
