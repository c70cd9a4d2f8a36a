//! Failure modes specific to compiling, instantiating, and invoking a WASM
//! activity module (spec.md §7 "Activity failure": "WASM trapped, exceeded
//! memory/time, or returned malformed output").

use thiserror::Error;

use actor_rt_core::AdapterError;

/// Internal error detail for one activity invocation attempt. Always folded
/// into an [`AdapterError::ActivityFailure`] before crossing into the engine
/// or the retry handler, so callers outside this crate see one taxonomy
/// (spec.md §7 "kinds, not type names").
#[derive(Debug, Error)]
pub enum WasmActivityError {
    #[error("failed to compile module: {0}")]
    Compile(String),

    #[error("failed to instantiate module: {0}")]
    Instantiate(String),

    #[error("module export '{export}' unavailable: {reason}")]
    MissingExport { export: String, reason: String },

    #[error("execution trapped: {0}")]
    Trap(String),

    #[error("execution exceeded {limit_ms}ms wall-clock budget")]
    Timeout { limit_ms: u64 },

    #[error("output was not valid UTF-8 JSON: {0}")]
    MalformedOutput(String),

    #[error("activity returned an error payload: {0}")]
    ApplicationError(String),
}

impl WasmActivityError {
    /// Whether the retry handler should consider this class of failure for
    /// another attempt, independent of the configured `RetryPolicy`'s text
    /// matching (spec.md §4.4 point 5: "consult the retry policy").
    pub fn is_retryable(&self) -> bool {
        // A module that deliberately reported `{"error": ...}` will report
        // the same thing again for the same input; retrying wastes attempts
        // that a transient trap/timeout/compile failure could use instead.
        !matches!(
            self,
            WasmActivityError::MissingExport { .. } | WasmActivityError::ApplicationError(_)
        )
    }

    pub fn into_adapter_error(self, activity_name: &str) -> AdapterError {
        AdapterError::activity_failure(activity_name, self.to_string())
    }
}
