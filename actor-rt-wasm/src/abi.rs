//! Host-side marshalling for the WASM activity ABI (spec.md §6 "WASM
//! activity ABI"): a module exports `execute(ptr, len) -> packed`, taking and
//! returning UTF-8 JSON, plus optional `allocate`/`deallocate` helpers for
//! host-side buffer management and a linear memory export.
//!
//! `execute`'s packed `i64` return value encodes the output buffer as
//! `(out_ptr << 32) | out_len` — this workspace's concrete choice for a
//! pointer/length pair that fits wasmtime's scalar-only core-module calling
//! convention; the spec leaves the exact encoding to the implementation.

use wasmtime::{AsContextMut, Memory, TypedFunc};

use crate::error::WasmActivityError;

/// The exported functions an activity module must provide to be callable
/// through this host (spec.md §6).
pub struct ActivityAbi {
    pub execute: TypedFunc<(i32, i32), i64>,
    pub allocate: TypedFunc<i32, i32>,
    pub deallocate: TypedFunc<(i32, i32), ()>,
    pub memory: Memory,
}

impl ActivityAbi {
    /// Resolves the ABI exports from an instantiated module. `allocate` and
    /// `deallocate` are nominally optional per spec.md §6, but this host
    /// requires them to marshal bytes into guest memory safely; a module
    /// omitting them cannot be hosted here (see DESIGN.md).
    pub fn resolve(
        mut store: impl AsContextMut,
        instance: &wasmtime::Instance,
    ) -> Result<Self, WasmActivityError> {
        let execute = instance
            .get_typed_func::<(i32, i32), i64>(&mut store, "execute")
            .map_err(|e| WasmActivityError::MissingExport {
                export: "execute".into(),
                reason: e.to_string(),
            })?;
        let allocate = instance
            .get_typed_func::<i32, i32>(&mut store, "allocate")
            .map_err(|e| WasmActivityError::MissingExport {
                export: "allocate".into(),
                reason: e.to_string(),
            })?;
        let deallocate = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, "deallocate")
            .map_err(|e| WasmActivityError::MissingExport {
                export: "deallocate".into(),
                reason: e.to_string(),
            })?;
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| WasmActivityError::MissingExport {
                export: "memory".into(),
                reason: "no exported linear memory".into(),
            })?;
        Ok(Self {
            execute,
            allocate,
            deallocate,
            memory,
        })
    }
}

/// Packs an `(offset, length)` pair the way `execute`'s return value encodes
/// its output buffer.
pub fn pack(ptr: i32, len: i32) -> i64 {
    ((ptr as u32 as i64) << 32) | (len as u32 as i64)
}

/// Inverse of [`pack`].
pub fn unpack(packed: i64) -> (i32, i32) {
    let ptr = ((packed >> 32) & 0xffff_ffff) as u32 as i32;
    let len = (packed & 0xffff_ffff) as u32 as i32;
    (ptr, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        assert_eq!(unpack(pack(128, 42)), (128, 42));
        assert_eq!(unpack(pack(0, 0)), (0, 0));
    }
}
