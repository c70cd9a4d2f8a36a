//! Error taxonomy shared by every adapter and the engine (spec.md §7
//! "Error handling design").

use thiserror::Error;

/// Result type alias for adapter and engine operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Structured error information for adapter and engine operations, following
/// the "kinds, not type names" taxonomy of spec.md §7.
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    /// Timeout, broker/store unavailability, rate limiting. Retryable per
    /// policy.
    #[error("transient failure in {operation}: {reason}")]
    Transient { operation: String, reason: String },

    /// WASM trapped, exceeded memory/time, or returned malformed output.
    #[error("activity '{activity_name}' failed: {reason}")]
    ActivityFailure {
        activity_name: String,
        reason: String,
    },

    /// Another process holds a valid lease on the actor.
    #[error("lease contention for actor {actor_id}: held by {holder}")]
    LeaseContention { actor_id: String, holder: String },

    /// Unknown actor_type, missing activity definition, missing blob.
    /// Dead-lettered after one attempt.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Unreadable journal entry; the reader skips it and continues.
    #[error("corrupt journal entry at cursor {cursor}: {reason}")]
    Corruption { cursor: u64, reason: String },

    /// The requested record does not exist in the backing store.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Serialization or deserialization of a stored value failed.
    #[error("serialization error in {context}: {reason}")]
    Serialization { context: String, reason: String },

    /// The underlying adapter backend (queue, store, coordinator, blob)
    /// returned an error this crate does not further classify.
    #[error("backend error from {adapter}: {reason}")]
    Backend { adapter: String, reason: String },
}

impl AdapterError {
    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn activity_failure(activity_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActivityFailure {
            activity_name: activity_name.into(),
            reason: reason.into(),
        }
    }

    pub fn lease_contention(actor_id: impl Into<String>, holder: impl Into<String>) -> Self {
        Self::LeaseContention {
            actor_id: actor_id.into(),
            holder: holder.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn corruption(cursor: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            cursor,
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn serialization(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient { .. })
    }

    pub fn is_activity_failure(&self) -> bool {
        matches!(self, AdapterError::ActivityFailure { .. })
    }

    pub fn is_lease_contention(&self) -> bool {
        matches!(self, AdapterError::LeaseContention { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AdapterError::Configuration { .. })
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, AdapterError::Corruption { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound { .. })
    }

    /// Lease contention is nacked with delay, never treated as a retryable
    /// failure (spec.md §7); configuration errors are dead-lettered after one
    /// attempt rather than retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::Transient { .. }
                | AdapterError::ActivityFailure { .. }
                | AdapterError::Backend { .. }
        )
    }

    /// Category label used for `actor.errors` telemetry and log fields
    /// (spec.md §6 "Telemetry event emission").
    pub fn category(&self) -> &'static str {
        match self {
            AdapterError::Transient { .. } => "transient",
            AdapterError::ActivityFailure { .. } => "activity_failure",
            AdapterError::LeaseContention { .. } => "lease_contention",
            AdapterError::Configuration { .. } => "configuration",
            AdapterError::Corruption { .. } => "corruption",
            AdapterError::NotFound { .. } => "not_found",
            AdapterError::Serialization { .. } => "serialization",
            AdapterError::Backend { .. } => "backend",
        }
    }
}
