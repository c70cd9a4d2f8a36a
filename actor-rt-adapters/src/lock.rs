//! Distributed exclusive lease per actor identity (spec.md §4.2 "Lock
//! adapter", §5 "Lease lifecycle").

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use actor_rt_core::{AdapterResult, LeaseId};

/// A held lease: `{actor_id, lease_id, expires_at}` (spec.md §3 "Lease").
#[derive(Debug, Clone)]
pub struct Lease {
    pub key: String,
    pub lease_id: LeaseId,
    pub expires_at: Instant,
}

/// Exclusive lease acquisition with renewal and loss detection. A failed
/// `acquire` means another holder exists; `renew` returns `false` if the
/// lease was already lost, e.g. stolen after expiry (spec.md §4.2).
#[async_trait]
pub trait LockAdapter: Send + Sync {
    async fn acquire(&self, key: &str, ttl: Duration) -> AdapterResult<Option<Lease>>;

    async fn release(&self, lease: &Lease) -> AdapterResult<()>;

    async fn renew(&self, lease: &Lease, ttl: Duration) -> AdapterResult<bool>;
}

#[derive(Debug, Clone)]
struct Holder {
    lease_id: LeaseId,
    expires_at: Instant,
}

/// Single-process, in-memory `LockAdapter`. Implements lease
/// expiry/renewal/theft faithfully so the single-writer invariant is
/// testable without a real quorum store (spec.md §8 "Single-writer").
#[derive(Debug, Default)]
pub struct InMemoryLockAdapter {
    holders: DashMap<String, Holder>,
}

impl InMemoryLockAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockAdapter for InMemoryLockAdapter {
    async fn acquire(&self, key: &str, ttl: Duration) -> AdapterResult<Option<Lease>> {
        let now = Instant::now();
        let expires_at = now + ttl;
        let lease_id = LeaseId::new();

        let granted = match self.holders.get(key) {
            Some(holder) if holder.expires_at > now => false,
            _ => true,
        };
        if granted {
            self.holders.insert(
                key.to_string(),
                Holder {
                    lease_id: lease_id.clone(),
                    expires_at,
                },
            );
            Ok(Some(Lease {
                key: key.to_string(),
                lease_id,
                expires_at,
            }))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, lease: &Lease) -> AdapterResult<()> {
        if let Some(holder) = self.holders.get(&lease.key) {
            if holder.lease_id == lease.lease_id {
                drop(holder);
                self.holders.remove(&lease.key);
            }
        }
        Ok(())
    }

    async fn renew(&self, lease: &Lease, ttl: Duration) -> AdapterResult<bool> {
        let now = Instant::now();
        let mut renewed = false;
        if let Some(mut holder) = self.holders.get_mut(&lease.key) {
            if holder.lease_id == lease.lease_id && holder.expires_at > now {
                holder.expires_at = now + ttl;
                renewed = true;
            }
        }
        Ok(renewed)
    }
}
