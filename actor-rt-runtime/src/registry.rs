//! `actor_type` → behavior lookup (spec.md §4.6 "a registry mapping
//! `actor_type → {kind, factory_or_blob_path, version}`").
//!
//! Actor behaviors in this workspace are stateless dispatch targets — all
//! per-actor state lives in the journal/state store, not in the behavior
//! object — so a single shared `Arc<dyn ActorBehavior>` per `actor_type`
//! plays the role of spec.md's "factory": there is nothing instance-specific
//! to construct. Hosting an actor's own body as a WASM module (the `kind:
//! wasm` case) is not implemented here; see DESIGN.md.

use std::sync::Arc;

use dashmap::DashMap;

use actor_rt_engine::ActorBehavior;

/// Maps `actor_type` to the behavior that drives it (spec.md §4.6).
#[derive(Default)]
pub struct ActorTypeRegistry {
    behaviors: DashMap<String, Arc<dyn ActorBehavior>>,
}

impl ActorTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, actor_type: impl Into<String>, behavior: Arc<dyn ActorBehavior>) {
        self.behaviors.insert(actor_type.into(), behavior);
    }

    pub fn resolve(&self, actor_type: &str) -> Option<Arc<dyn ActorBehavior>> {
        self.behaviors.get(actor_type).map(|entry| entry.clone())
    }

    pub fn is_registered(&self, actor_type: &str) -> bool {
        self.behaviors.contains_key(actor_type)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use actor_rt_engine::{ActorContext, ActorError};

    struct NoOp;
    impl ActorBehavior for NoOp {
        fn execute(
            &self,
            _ctx: &mut ActorContext<'_>,
            _input: serde_json::Value,
        ) -> Result<serde_json::Value, ActorError> {
            Ok(serde_json::json!({}))
        }
    }

    #[test]
    fn resolve_returns_registered_behavior() {
        let registry = ActorTypeRegistry::new();
        assert!(!registry.is_registered("counter"));
        registry.register("counter", Arc::new(NoOp));
        assert!(registry.is_registered("counter"));
        assert!(registry.resolve("counter").is_some());
    }

    #[test]
    fn resolve_unknown_type_is_none() {
        let registry = ActorTypeRegistry::new();
        assert!(registry.resolve("widget").is_none());
    }
}
