//! The durable actor runtime: actor pool/lease-gated activation and the
//! worker loop that dispatches queued messages against it (spec.md §4.6,
//! §4.7).

mod pool;
pub mod registry;
pub mod runtime;
pub mod worker;

pub use registry::ActorTypeRegistry;
pub use runtime::{ActorRuntime, Invocation};
pub use worker::ActorWorker;
