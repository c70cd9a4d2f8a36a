//! The result of driving one actor invocation to completion (spec.md §9
//! design notes: "an explicit invocation result variant ... the worker
//! pattern-matches on this rather than catching exceptions").

use serde::{Deserialize, Serialize};
use thiserror::Error;

use actor_rt_core::{ActivityInvocationId, AdapterError};

/// Everything needed to hand an activity invocation to the Activity
/// Executor (spec.md §4.3 point 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub activity_id: ActivityInvocationId,
    pub activity_name: String,
    pub input: serde_json::Value,
}

/// The event an actor is now waiting for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub event_type: String,
}

/// Raised by [`crate::context::ActorContext::call_activity`] and
/// [`crate::context::ActorContext::await_event`] when the current call site
/// has no recorded result yet. Carried inside [`ActorError::Suspended`] so
/// actor code can use `?`, but an [`ActorEngine`](crate::engine::ActorEngine)
/// always converts it to an [`InvocationOutcome`] before anything outside
/// this crate sees it — the worker never catches it as an exception.
#[derive(Debug, Clone)]
pub enum Suspend {
    OnActivity(ActivityRequest),
    OnEvent(EventRequest),
}

/// The error type actor behaviors return from `execute`/`resume*`.
#[derive(Debug, Error)]
pub enum ActorError {
    /// An application-level failure raised by the actor's own logic.
    #[error("{message}")]
    Application { message: String },

    /// The recorded outcome of a previously requested activity was a
    /// failure; `call_activity` re-raises it verbatim (spec.md §4.3 point 2).
    #[error("activity '{activity_name}' failed: {error}")]
    ActivityFailed {
        activity_name: String,
        error: String,
    },

    /// An adapter call made on the actor's behalf failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Internal-only: the invocation must suspend. See [`Suspend`].
    #[error("suspended")]
    Suspended(Suspend),
}

impl ActorError {
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, ActorError::Suspended(_))
    }
}

impl From<Suspend> for ActorError {
    fn from(suspend: Suspend) -> Self {
        ActorError::Suspended(suspend)
    }
}

/// What happened when the engine drove one invocation (spec.md §9: the sum
/// type the worker matches on instead of catching a typed exception).
#[derive(Debug)]
pub enum InvocationOutcome {
    /// The handler returned normally with a result value.
    Completed(serde_json::Value),
    /// The handler called `call_activity` for a call site with no recorded
    /// result yet.
    SuspendedOnActivity(ActivityRequest),
    /// The handler called `await_event` for a call site with no recorded
    /// result yet.
    SuspendedOnEvent(EventRequest),
    /// The handler returned an application or adapter error.
    Failed(ActorError),
}

impl InvocationOutcome {
    /// Converts a behavior's raw `Result` into the outcome the worker
    /// matches on, unwrapping the internal suspension signal.
    pub fn from_result(result: Result<serde_json::Value, ActorError>) -> Self {
        match result {
            Ok(value) => InvocationOutcome::Completed(value),
            Err(ActorError::Suspended(Suspend::OnActivity(request))) => {
                InvocationOutcome::SuspendedOnActivity(request)
            }
            Err(ActorError::Suspended(Suspend::OnEvent(request))) => {
                InvocationOutcome::SuspendedOnEvent(request)
            }
            Err(other) => InvocationOutcome::Failed(other),
        }
    }
}
