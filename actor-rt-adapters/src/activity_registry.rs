//! Name→activity-definition lookup with versioning (spec.md §4.2 "Activity
//! registry", §3 "Activity definition").

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use actor_rt_core::{AdapterError, AdapterResult};

/// Resource budget for one activity invocation (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLimits {
    pub max_memory_mb: u32,
    pub max_execution_ms: u64,
}

/// `{name, version, blob_path, limits, capabilities?}` (spec.md §3 "Activity
/// definition"). Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub name: String,
    pub version: String,
    pub blob_path: String,
    pub limits: ActivityLimits,
    pub capabilities: Vec<String>,
}

/// Name→definition lookup with versioning.
#[async_trait]
pub trait ActivityRegistry: Send + Sync {
    async fn save(&self, definition: ActivityDefinition) -> AdapterResult<()>;

    /// `version == None` resolves the latest published version by
    /// descending semantic version (spec.md §4.2).
    async fn resolve(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> AdapterResult<ActivityDefinition>;

    async fn list(&self, name: &str) -> AdapterResult<Vec<ActivityDefinition>>;

    async fn delete(&self, name: &str, version: &str) -> AdapterResult<()>;

    async fn exists(&self, name: &str, version: &str) -> AdapterResult<bool>;
}

/// Parses a `major.minor.patch`-shaped version string into a comparable
/// tuple; non-numeric or short components sort as if they were `0`, so
/// `resolve(name, None)` has a well-defined "latest" even for loosely
/// formatted versions.
fn version_key(version: &str) -> (u64, u64, u64) {
    let mut parts = version.split('.').map(|part| part.parse::<u64>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Single-process, in-memory `ActivityRegistry` (spec.md §6 "Adapter
/// selection": `inmemory` tag).
#[derive(Debug, Default)]
pub struct InMemoryActivityRegistry {
    definitions: DashMap<String, Vec<ActivityDefinition>>,
}

impl InMemoryActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityRegistry for InMemoryActivityRegistry {
    async fn save(&self, definition: ActivityDefinition) -> AdapterResult<()> {
        let mut versions = self.definitions.entry(definition.name.clone()).or_default();
        if versions.iter().any(|existing| existing.version == definition.version) {
            return Err(AdapterError::configuration(format!(
                "activity '{}' version '{}' already published and is immutable",
                definition.name, definition.version
            )));
        }
        versions.push(definition);
        Ok(())
    }

    async fn resolve(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> AdapterResult<ActivityDefinition> {
        let versions = self
            .definitions
            .get(name)
            .ok_or_else(|| AdapterError::configuration(format!("unknown activity '{name}'")))?;

        let found = match version {
            Some(requested) => versions.iter().find(|def| def.version == requested).cloned(),
            None => versions
                .iter()
                .max_by_key(|def| version_key(&def.version))
                .cloned(),
        };
        found.ok_or_else(|| {
            AdapterError::configuration(format!(
                "no matching version for activity '{name}' (requested: {version:?})"
            ))
        })
    }

    async fn list(&self, name: &str) -> AdapterResult<Vec<ActivityDefinition>> {
        Ok(self
            .definitions
            .get(name)
            .map(|versions| versions.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, name: &str, version: &str) -> AdapterResult<()> {
        if let Some(mut versions) = self.definitions.get_mut(name) {
            versions.retain(|def| def.version != version);
        }
        Ok(())
    }

    async fn exists(&self, name: &str, version: &str) -> AdapterResult<bool> {
        Ok(self
            .definitions
            .get(name)
            .is_some_and(|versions| versions.iter().any(|def| def.version == version)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn definition(name: &str, version: &str) -> ActivityDefinition {
        ActivityDefinition {
            name: name.to_string(),
            version: version.to_string(),
            blob_path: format!("wasm/{name}-{version}"),
            limits: ActivityLimits {
                max_memory_mb: 64,
                max_execution_ms: 5_000,
            },
            capabilities: Vec::new(),
        }
    }

    #[tokio::test]
    async fn resolve_without_version_picks_latest_semver() {
        let registry = InMemoryActivityRegistry::new();
        registry.save(definition("send_email", "1.0.0")).await.unwrap();
        registry.save(definition("send_email", "1.2.0")).await.unwrap();
        registry.save(definition("send_email", "1.10.0")).await.unwrap();
        let resolved = registry.resolve("send_email", None).await.unwrap();
        assert_eq!(resolved.version, "1.10.0");
    }

    #[tokio::test]
    async fn resolve_with_version_returns_exact_match() {
        let registry = InMemoryActivityRegistry::new();
        registry.save(definition("send_email", "1.0.0")).await.unwrap();
        registry.save(definition("send_email", "1.2.0")).await.unwrap();
        let resolved = registry.resolve("send_email", Some("1.0.0")).await.unwrap();
        assert_eq!(resolved.version, "1.0.0");
    }

    #[tokio::test]
    async fn resolve_unknown_activity_is_a_configuration_error() {
        let registry = InMemoryActivityRegistry::new();
        let result = registry.resolve("nonexistent", None).await;
        assert!(result.unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn republishing_same_version_is_rejected() {
        let registry = InMemoryActivityRegistry::new();
        registry.save(definition("send_email", "1.0.0")).await.unwrap();
        let result = registry.save(definition("send_email", "1.0.0")).await;
        assert!(result.is_err());
    }
}
