//! The context object actor behaviors use to request activities, await
//! events, and mutate state (spec.md §9: "explicit context structs with the
//! actor's identity, correlation ... and a handle to request activities").

use actor_rt_core::{ActorId, Trace};

use crate::engine::ActorEngine;
use crate::outcome::ActorError;

/// Passed to every [`ActorBehavior`](crate::behavior::ActorBehavior) entry
/// point. Borrows the engine so `call_activity`/`await_event`/`update_state`
/// can append journal entries and mutate state, but exposes none of the
/// engine's replay bookkeeping directly.
pub struct ActorContext<'a> {
    engine: &'a mut ActorEngine,
    correlation_id: &'a str,
    trace: &'a Trace,
}

impl<'a> ActorContext<'a> {
    pub fn new(engine: &'a mut ActorEngine, correlation_id: &'a str, trace: &'a Trace) -> Self {
        Self {
            engine,
            correlation_id,
            trace,
        }
    }

    pub fn actor_id(&self) -> &ActorId {
        self.engine.actor_id()
    }

    pub fn correlation_id(&self) -> &str {
        self.correlation_id
    }

    pub fn trace(&self) -> &Trace {
        self.trace
    }

    /// Read-only view of the actor's current state.
    pub fn state(&self) -> &serde_json::Value {
        self.engine.state()
    }

    /// Scoped mutation (spec.md §4.3 `update_state`): `mutator` receives an
    /// exclusively-mutable draft; on success the draft replaces the actor's
    /// state atomically and a `state_changed` journal entry is appended.
    pub fn update_state(
        &mut self,
        mutator: impl FnOnce(&mut serde_json::Value) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        self.engine.update_state(mutator)
    }

    /// Requests a sandboxed side-effect. Replay-mode (a recorded
    /// `activity_completed`/`activity_failed` exists for this call site)
    /// returns or re-raises immediately; otherwise this call suspends the
    /// invocation (spec.md §4.3 "Suspension protocol").
    pub fn call_activity(
        &mut self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ActorError> {
        self.engine.call_activity(name, input)
    }

    /// Requests an external event. Same replay semantics as
    /// `call_activity`, keyed by the order `await_event` calls occur in.
    pub fn await_event(&mut self, event_type: &str) -> Result<serde_json::Value, ActorError> {
        self.engine.await_event(event_type)
    }
}
