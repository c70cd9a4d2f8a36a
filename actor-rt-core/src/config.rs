//! Runtime configuration with sensible defaults (spec.md §6 "Adapter
//! selection", §5 "Lease lifecycle", §3 "compaction threshold").

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment as EnvSource, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// Default lease TTL: ≈30s (spec.md §5 "Lease lifecycle").
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// Default renewal interval: ≈1/3 of the TTL (spec.md §4.2 point 7, §5).
pub const DEFAULT_LEASE_RENEWAL_INTERVAL: Duration = Duration::from_secs(10);

/// Default maximum pooled actors per worker (0 = unlimited).
pub const DEFAULT_MAX_POOL_SIZE: usize = 1000;

/// Default idle time before an actor is evicted from the pool.
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(300);

/// Default journal entry count that triggers compaction (spec.md §3:
/// "default in the tens to low hundreds").
pub const DEFAULT_COMPACTION_THRESHOLD: u64 = 100;

/// Which backend implements a given adapter category (spec.md §6).
/// `Inmemory` is the dev/test tag; `Durable` stands in for "one production
/// tag per category" — which concrete backend that resolves to is a
/// deployment-time choice made by whatever wires up the adapter trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Inmemory,
    Durable,
}

impl AdapterKind {
    pub fn is_inmemory(&self) -> bool {
        matches!(self, AdapterKind::Inmemory)
    }
}

/// Selected backend for each adapter category (spec.md §6 "Adapter
/// selection"): `{message_queue, state_store, coordination, blob, journal,
/// idempotency}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSelection {
    pub message_queue: AdapterKind,
    pub state_store: AdapterKind,
    pub coordination: AdapterKind,
    pub blob: AdapterKind,
    pub journal: AdapterKind,
    pub idempotency: AdapterKind,
}

impl Default for AdapterSelection {
    fn default() -> Self {
        Self {
            message_queue: AdapterKind::Inmemory,
            state_store: AdapterKind::Inmemory,
            coordination: AdapterKind::Inmemory,
            blob: AdapterKind::Inmemory,
            journal: AdapterKind::Inmemory,
            idempotency: AdapterKind::Inmemory,
        }
    }
}

impl AdapterSelection {
    /// True if any category still points at an in-memory adapter, the
    /// condition that should log a startup warning when `environment` is
    /// production (spec.md §6: "in-memory variants are expected to log a
    /// warning when selected in a production environment").
    pub fn has_inmemory_selection(&self) -> bool {
        self.message_queue.is_inmemory()
            || self.state_store.is_inmemory()
            || self.coordination.is_inmemory()
            || self.blob.is_inmemory()
            || self.journal.is_inmemory()
            || self.idempotency.is_inmemory()
    }
}

/// Deployment environment, used only to decide whether an in-memory adapter
/// selection should warn at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// System-wide configuration for the durable actor runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Backend selection per adapter category.
    pub adapters: AdapterSelection,

    /// Deployment environment; gates the in-memory-in-production warning.
    pub environment: Environment,

    /// TTL granted to a freshly acquired lease.
    pub lease_ttl: Duration,

    /// Interval at which a held lease is renewed (≈1/3 of `lease_ttl`).
    pub lease_renewal_interval: Duration,

    /// Maximum pooled actors per worker (0 = unlimited).
    pub max_pool_size: usize,

    /// Idle time after which a pooled actor is eligible for eviction.
    pub max_idle_time: Duration,

    /// Journal entry count that triggers compaction.
    pub compaction_threshold: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            adapters: AdapterSelection::default(),
            environment: Environment::default(),
            lease_ttl: DEFAULT_LEASE_TTL,
            lease_renewal_interval: DEFAULT_LEASE_RENEWAL_INTERVAL,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.lease_ttl.is_zero() {
            return Err("lease_ttl must be > 0".to_string());
        }
        if self.lease_renewal_interval.is_zero() {
            return Err("lease_renewal_interval must be > 0".to_string());
        }
        if self.lease_renewal_interval >= self.lease_ttl {
            return Err("lease_renewal_interval must be less than lease_ttl".to_string());
        }
        if self.compaction_threshold == 0 {
            return Err("compaction_threshold must be > 0".to_string());
        }
        Ok(())
    }

    /// Whether a startup warning should be logged for the current adapter
    /// selection (spec.md §6).
    pub fn should_warn_inmemory(&self) -> bool {
        self.environment == Environment::Production && self.adapters.has_inmemory_selection()
    }

    /// Loads configuration layered as defaults, then an optional TOML file,
    /// then `ACTOR_RT__*` environment variables (`__` separates nesting, so
    /// `ACTOR_RT__ADAPTERS__MESSAGE_QUEUE=durable` overrides
    /// `adapters.message_queue`). Missing fields at every layer fall back to
    /// `RuntimeConfig::default()`; the file is optional so a deployment with
    /// only environment overrides still loads cleanly.
    pub fn load(file_path: Option<&Path>) -> AdapterResult<RuntimeConfig> {
        let mut builder = Config::builder();
        if let Some(path) = file_path {
            let source = path
                .to_str()
                .ok_or_else(|| AdapterError::configuration("config path is not valid UTF-8"))?;
            builder = builder.add_source(File::new(source, FileFormat::Toml).required(false));
        }
        builder = builder.add_source(EnvSource::with_prefix("ACTOR_RT").separator("__"));

        let raw = builder
            .build()
            .map_err(|error| AdapterError::configuration(format!("failed to assemble configuration sources: {error}")))?;
        let overlay: RuntimeConfigFile = raw
            .try_deserialize()
            .map_err(|error| AdapterError::configuration(format!("invalid configuration: {error}")))?;

        let config = overlay.onto_defaults();
        config
            .validate()
            .map_err(AdapterError::configuration)?;
        Ok(config)
    }
}

/// Deserialization target for the file/env layers: every field optional so
/// an absent layer (no file, no matching env var) leaves the default in
/// place rather than forcing every value to be respecified.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RuntimeConfigFile {
    adapters: Option<AdapterSelectionFile>,
    environment: Option<Environment>,
    lease_ttl_ms: Option<u64>,
    lease_renewal_interval_ms: Option<u64>,
    max_pool_size: Option<usize>,
    max_idle_time_ms: Option<u64>,
    compaction_threshold: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct AdapterSelectionFile {
    message_queue: Option<AdapterKind>,
    state_store: Option<AdapterKind>,
    coordination: Option<AdapterKind>,
    blob: Option<AdapterKind>,
    journal: Option<AdapterKind>,
    idempotency: Option<AdapterKind>,
}

impl RuntimeConfigFile {
    fn onto_defaults(self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        if let Some(adapters) = self.adapters {
            if let Some(kind) = adapters.message_queue {
                config.adapters.message_queue = kind;
            }
            if let Some(kind) = adapters.state_store {
                config.adapters.state_store = kind;
            }
            if let Some(kind) = adapters.coordination {
                config.adapters.coordination = kind;
            }
            if let Some(kind) = adapters.blob {
                config.adapters.blob = kind;
            }
            if let Some(kind) = adapters.journal {
                config.adapters.journal = kind;
            }
            if let Some(kind) = adapters.idempotency {
                config.adapters.idempotency = kind;
            }
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(ms) = self.lease_ttl_ms {
            config.lease_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = self.lease_renewal_interval_ms {
            config.lease_renewal_interval = Duration::from_millis(ms);
        }
        if let Some(size) = self.max_pool_size {
            config.max_pool_size = size;
        }
        if let Some(ms) = self.max_idle_time_ms {
            config.max_idle_time = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.compaction_threshold {
            config.compaction_threshold = threshold;
        }
        config
    }
}

/// Builder for `RuntimeConfig` with a fluent API.
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn with_adapters(mut self, adapters: AdapterSelection) -> Self {
        self.config.adapters = adapters;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.config.lease_ttl = ttl;
        self
    }

    pub fn with_lease_renewal_interval(mut self, interval: Duration) -> Self {
        self.config.lease_renewal_interval = interval;
        self
    }

    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    pub fn with_max_idle_time(mut self, idle: Duration) -> Self {
        self.config.max_idle_time = idle;
        self
    }

    pub fn with_compaction_threshold(mut self, threshold: u64) -> Self {
        self.config.compaction_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<RuntimeConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lease_ttl, DEFAULT_LEASE_TTL);
        assert!(!config.should_warn_inmemory());
    }

    #[test]
    fn production_with_inmemory_adapters_warns() {
        let config = RuntimeConfig::builder()
            .with_environment(Environment::Production)
            .build()
            .unwrap();
        assert!(config.should_warn_inmemory());
    }

    #[test]
    fn renewal_interval_must_be_shorter_than_ttl() {
        let result = RuntimeConfig::builder()
            .with_lease_ttl(Duration::from_secs(10))
            .with_lease_renewal_interval(Duration::from_secs(10))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_compaction_threshold_is_rejected() {
        let result = RuntimeConfig::builder().with_compaction_threshold(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_sets_multiple_options() {
        let config = RuntimeConfig::builder()
            .with_max_pool_size(50)
            .with_compaction_threshold(200)
            .build()
            .unwrap();
        assert_eq!(config.max_pool_size, 50);
        assert_eq!(config.compaction_threshold, 200);
    }

    #[test]
    fn serializes_round_trip() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.lease_ttl, config.lease_ttl);
        assert_eq!(decoded.compaction_threshold, config.compaction_threshold);
    }

    #[test]
    fn load_with_no_file_and_no_env_returns_defaults() {
        let config = RuntimeConfig::load(None).unwrap();
        assert_eq!(config.lease_ttl, DEFAULT_LEASE_TTL);
        assert_eq!(config.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    }

    #[test]
    fn load_applies_file_overrides_on_top_of_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(
            &path,
            r#"
            environment = "production"
            max_pool_size = 250
            compaction_threshold = 50

            [adapters]
            message_queue = "durable"
            "#,
        )
        .unwrap();

        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_pool_size, 250);
        assert_eq!(config.compaction_threshold, 50);
        assert_eq!(config.adapters.message_queue, AdapterKind::Durable);
        // Untouched fields keep their defaults.
        assert_eq!(config.lease_ttl, DEFAULT_LEASE_TTL);
    }

    #[test]
    fn load_rejects_a_file_that_produces_an_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "compaction_threshold = 0\n").unwrap();

        let result = RuntimeConfig::load(Some(&path));
        assert!(result.is_err());
    }

    #[test]
    fn load_tolerates_a_missing_file() {
        let config = RuntimeConfig::load(Some(Path::new("/nonexistent/runtime.toml"))).unwrap();
        assert_eq!(config.lease_ttl, DEFAULT_LEASE_TTL);
    }
}
