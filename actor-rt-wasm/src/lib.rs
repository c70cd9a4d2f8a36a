//! The Activity Executor (spec.md §4.4): loads, sandboxes, and invokes
//! WASM activity modules behind the actor runtime's retry and idempotency
//! machinery.
//!
//! Uses the core `wasmtime::Module`/`Linker` API, not the Component Model,
//! since the activity ABI (spec.md §6) is a raw pointer/length pair rather
//! than a WIT interface.

pub mod abi;
pub mod error;
pub mod executor;
pub mod limits;
pub mod module_cache;

pub use abi::ActivityAbi;
pub use error::WasmActivityError;
pub use executor::{ActivityExecutor, ActivityJob};
pub use limits::WasmResourceLimiter;
pub use module_cache::ModuleCache;
