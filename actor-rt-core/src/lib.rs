//! Core types shared by every layer of the durable actor runtime.
//!
//! `actor-rt-core` has no knowledge of storage, brokers, or WebAssembly — it
//! only defines the vocabulary the rest of the workspace speaks: actor
//! identity, messages, journal entries, snapshots, leases, activity
//! definitions, retry policy, configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod id;
pub mod journal;
pub mod message;
pub mod retry;
pub mod time;

pub use config::{AdapterKind, AdapterSelection, Environment, RuntimeConfig};
pub use error::{AdapterError, AdapterResult};
pub use id::{ActivityInvocationId, ActorId, LeaseId, MessageId};
pub use journal::{JournalEntry, JournalEntryKind, Snapshot};
pub use message::{Message, MessageMetadata, MessageType, Trace};
pub use retry::{RetryPolicy, RetryPreset};
pub use time::now_ms;
