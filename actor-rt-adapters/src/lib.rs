//! Storage, broker, and coordination adapters for the durable actor runtime.
//!
//! Every adapter category is a trait (spec.md §4.1/§4.2), with an in-memory
//! implementation here for development and testing. A durable,
//! cluster-safe implementation of the same trait is a deployment-time
//! choice; this crate only fixes the contract.

pub mod activity_registry;
pub mod blob;
pub mod idempotency;
pub mod journal_store;
pub mod lock;
pub mod message_queue;
pub mod state_store;

pub use activity_registry::{
    ActivityDefinition, ActivityLimits, ActivityRegistry, InMemoryActivityRegistry,
};
pub use blob::{BlobAdapter, InMemoryBlobAdapter};
pub use idempotency::{IdempotencyRecord, IdempotencyStore, InMemoryIdempotencyStore};
pub use journal_store::{InMemoryJournalStore, JournalStore};
pub use lock::{InMemoryLockAdapter, Lease, LockAdapter};
pub use message_queue::{DeadLetter, InMemoryMessageQueue, MessageQueue};
pub use state_store::{ActorStatus, InMemoryStateStore, StateRecord, StateStore};
