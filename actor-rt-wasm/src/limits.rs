//! Converts an activity definition's resource budget into Wasmtime's
//! enforcement mechanisms (spec.md §3 "Activity definition" `limits`,
//! §4.4 point 3 "Instantiate module in a fresh sandbox with memory
//! cap ... granting only declared capabilities").
//!
//! CPU time is hybrid-limited: the executor's `tokio::time::timeout` bounds
//! wall-clock, and fuel (below) bounds instruction count, so a module stuck
//! in a tight loop that never yields to the async scheduler still traps
//! instead of running forever on a stalled executor.

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use actor_rt_adapters::ActivityLimits;

/// Default cap on WASM table elements; activity definitions only budget
/// memory and execution time, so table growth gets one fixed ceiling.
const DEFAULT_TABLE_ELEMENTS: usize = 10_000;

/// Fuel units charged per millisecond of `max_execution_ms`. Wasmtime charges
/// roughly one unit per simple instruction, so this is a deliberately
/// generous ceiling meant to back up the wall-clock timeout, not to be the
/// primary CPU limit.
const FUEL_UNITS_PER_MILLISECOND: u64 = 1_000_000;

/// The fuel budget to set on a `Store` before invoking an activity with
/// these limits.
pub fn fuel_budget(limits: &ActivityLimits) -> u64 {
    limits
        .max_execution_ms
        .saturating_mul(FUEL_UNITS_PER_MILLISECOND)
}

/// Bridges `ActivityLimits` to Wasmtime's per-`Store` memory/table cap.
pub struct WasmResourceLimiter {
    store_limits: StoreLimits,
}

impl WasmResourceLimiter {
    pub fn new(limits: &ActivityLimits) -> Self {
        let max_memory_bytes = (limits.max_memory_mb as usize).saturating_mul(1024 * 1024);
        let store_limits = StoreLimitsBuilder::new()
            .memory_size(max_memory_bytes)
            .table_elements(DEFAULT_TABLE_ELEMENTS)
            .build();
        Self { store_limits }
    }

    pub fn into_store_limits(self) -> StoreLimits {
        self.store_limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_panicking() {
        let limits = ActivityLimits {
            max_memory_mb: 64,
            max_execution_ms: 5_000,
        };
        let limiter = WasmResourceLimiter::new(&limits);
        let _store_limits = limiter.into_store_limits();
    }

    #[test]
    fn fuel_budget_scales_with_execution_limit() {
        let limits = ActivityLimits {
            max_memory_mb: 64,
            max_execution_ms: 5_000,
        };
        assert_eq!(fuel_budget(&limits), 5_000 * FUEL_UNITS_PER_MILLISECOND);
    }
}
