//! Compiled-module cache keyed by `(name, version)` (spec.md §4.4 point 2:
//! "memoize compiled artifacts across invocations; on cache miss,
//! `blob_store.get(definition.blob_path)` and compile").
//!
//! Read-mostly; insertion is idempotent, so a race that compiles the same
//! module twice is harmless (spec.md §5 "Shared resources": "insertion is
//! idempotent (recompiling is safe)") — we simply let the second compile
//! overwrite the first rather than coordinate around it.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use wasmtime::{Engine, Module};

use actor_rt_adapters::{ActivityDefinition, BlobAdapter};

use crate::error::WasmActivityError;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    name: String,
    version: String,
}

/// Memoizes compiled `wasmtime::Module`s across activity invocations.
pub struct ModuleCache {
    engine: Engine,
    modules: DashMap<CacheKey, Arc<Module>>,
}

impl ModuleCache {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            modules: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the compiled module for `definition`, compiling and caching it
    /// on a miss.
    pub async fn get_or_compile(
        &self,
        definition: &ActivityDefinition,
        blobs: &dyn BlobAdapter,
    ) -> Result<Arc<Module>, WasmActivityError> {
        let key = CacheKey {
            name: definition.name.clone(),
            version: definition.version.clone(),
        };
        if let Some(module) = self.modules.get(&key) {
            debug!(activity = %definition.name, version = %definition.version, "module cache hit");
            return Ok(module.clone());
        }

        let bytes = blobs
            .get(&definition.blob_path)
            .await
            .map_err(|e| WasmActivityError::Compile(e.to_string()))?
            .ok_or_else(|| {
                WasmActivityError::Compile(format!("blob '{}' not found", definition.blob_path))
            })?;

        let module =
            Module::new(&self.engine, &bytes).map_err(|e| WasmActivityError::Compile(e.to_string()))?;
        let module = Arc::new(module);
        self.modules.insert(key, module.clone());
        Ok(module)
    }
}
