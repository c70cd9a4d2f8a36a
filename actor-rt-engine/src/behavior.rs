//! The trait application code implements to define an actor type (spec.md
//! §4.3 "Public contract", §9 "polymorphism over the capability set").

use actor_rt_core::ActivityInvocationId;

use crate::context::ActorContext;
use crate::outcome::ActorError;

/// One actor type's behavior. The runtime holds a registry of these, keyed
/// by `actor_type` (spec.md §9: "represent actor types as a registry of
/// factory closures or as a tagged variant; do not require a class
/// hierarchy").
///
/// Only `execute` is required. `resume`, `resume_with_activity`, and
/// `resume_with_activity_error` have default implementations that fail with
/// an application error, since most actors drive their entire lifecycle
/// through `call_activity`/`await_event` inside `execute` and never need a
/// distinct resumption entry point.
pub trait ActorBehavior: Send + Sync {
    /// Initial entry for an `execute` message.
    fn execute(
        &self,
        ctx: &mut ActorContext<'_>,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActorError>;

    /// Entry for an event-resume (spec.md §4.2 message dispatch, `event`
    /// case).
    fn resume(
        &self,
        ctx: &mut ActorContext<'_>,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, ActorError> {
        let _ = (ctx, data);
        Err(ActorError::application(format!(
            "actor does not handle resumption by event '{event_type}'"
        )))
    }

    /// Entry after a successful activity.
    fn resume_with_activity(
        &self,
        ctx: &mut ActorContext<'_>,
        activity_id: ActivityInvocationId,
        result: serde_json::Value,
    ) -> Result<serde_json::Value, ActorError> {
        let _ = (ctx, result);
        Err(ActorError::application(format!(
            "actor does not handle resumption for {activity_id}"
        )))
    }

    /// Entry after a failed activity.
    fn resume_with_activity_error(
        &self,
        ctx: &mut ActorContext<'_>,
        activity_id: ActivityInvocationId,
        error: &str,
    ) -> Result<serde_json::Value, ActorError> {
        let _ = ctx;
        Err(ActorError::application(format!(
            "actor does not handle resumption failure for {activity_id}: {error}"
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::engine::ActorEngine;
    use actor_rt_core::{ActorId, Trace};

    struct Counter;

    impl ActorBehavior for Counter {
        fn execute(
            &self,
            ctx: &mut ActorContext<'_>,
            input: serde_json::Value,
        ) -> Result<serde_json::Value, ActorError> {
            let delta = input["delta"].as_i64().unwrap_or(1);
            ctx.update_state(|state| {
                let current = state["count"].as_i64().unwrap_or(0);
                *state = serde_json::json!({"count": current + delta});
                Ok(())
            })?;
            Ok(ctx.state().clone())
        }
    }

    #[test]
    fn default_resume_fails_with_application_error() {
        let mut engine = ActorEngine::new(ActorId::new("counter", "a1"), serde_json::json!({}));
        let trace = Trace::default();
        let mut ctx = ActorContext::new(&mut engine, "corr-1", &trace);
        let result = Counter.resume(&mut ctx, "payment_confirmed", serde_json::json!({}));
        assert!(matches!(result, Err(ActorError::Application { .. })));
    }

    #[test]
    fn execute_mutates_state_through_context() {
        let mut engine = ActorEngine::new(ActorId::new("counter", "a1"), serde_json::json!({"count": 0}));
        let trace = Trace::default();
        let mut ctx = ActorContext::new(&mut engine, "corr-1", &trace);
        let result = Counter.execute(&mut ctx, serde_json::json!({"delta": 3})).unwrap();
        assert_eq!(result, serde_json::json!({"count": 3}));
    }
}
