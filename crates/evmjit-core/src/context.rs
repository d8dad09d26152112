//! Per-run execution context and store management.
//!
//! This module provides:
//! - [`ExecutionContext`]: Per-run state accessible from runtime functions
//! - [`create_store`]: Store construction with fuel and memory limits
//! - [`attach`]: Placement of the runtime data block in linear memory
//! - Accessors for the block used by the invoker and runtime functions

use wasmtime::{
    AsContext, Instance, Memory, Store, StoreContext, StoreContextMut, StoreLimits,
    StoreLimitsBuilder,
};

use evmjit_common::{ExecutionConfig, HostEnvironment, HostFunctionError, RuntimeError};

use crate::JitEngine;
use crate::runtime_data::{HEADER_SIZE, RuntimeData, Slot, read_scalar};

/// Name of the linear memory export generated code must provide.
pub const MEMORY_EXPORT: &str = "memory";

const WASM_PAGE_SIZE: u64 = 65_536;

/// Per-run execution context.
///
/// Created at the start of a run and dropped when the run returns. Runtime
/// functions reach it through the [`wasmtime::Caller`] API.
pub struct ExecutionContext {
    /// Unique run identifier for tracing.
    pub run_id: String,

    /// Address of the runtime data block, once attached.
    handle: Option<u32>,

    /// Linear memory holding the runtime data block.
    memory: Option<Memory>,

    /// Largest operand stack size reported during this run.
    stack_peak: u64,

    limits: StoreLimits,
}

impl ExecutionContext {
    /// Create a detached context.
    pub fn new(run_id: String, config: &ExecutionConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes())
            .build();

        Self {
            run_id,
            handle: None,
            memory: None,
            stack_peak: 0,
            limits,
        }
    }

    /// Address of the runtime data block passed to the entry symbol.
    pub fn handle(&self) -> Option<u32> {
        self.handle
    }

    /// Record an operand stack size reported by generated code.
    pub fn record_stack_size(&mut self, size: u64) {
        self.stack_peak = self.stack_peak.max(size);
    }

    /// Largest stack size reported during this run.
    pub fn stack_peak(&self) -> u64 {
        self.stack_peak
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("handle", &self.handle)
            .field("stack_peak", &self.stack_peak)
            .finish_non_exhaustive()
    }
}

/// Create a new store for one run.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &JitEngine,
    config: &ExecutionConfig,
    run_id: String,
) -> Result<Store<ExecutionContext>, RuntimeError> {
    let context = ExecutionContext::new(run_id, config);
    let mut store = Store::new(engine.inner(), context);

    store.limiter(|ctx| &mut ctx.limits);

    if engine.is_fuel_metered() {
        store
            .set_fuel(config.max_fuel)
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;
    }

    Ok(store)
}

/// Place the runtime data block for `env` in the instance's memory.
///
/// The block goes into freshly grown pages so it never overlaps data the
/// code unit laid out itself. Returns the block's address.
///
/// # Errors
///
/// Returns `ContextSetup` if the instance has no memory export or the
/// memory cannot hold the block.
pub fn attach(
    store: &mut Store<ExecutionContext>,
    instance: &Instance,
    env: &HostEnvironment,
    gas: u64,
) -> Result<u32, RuntimeError> {
    let memory = instance
        .get_memory(&mut *store, MEMORY_EXPORT)
        .ok_or_else(|| {
            RuntimeError::context_setup(format!("code unit does not export '{MEMORY_EXPORT}'"))
        })?;

    let len = RuntimeData::encoded_len(env) as u64;
    let pages = len.div_ceil(WASM_PAGE_SIZE);

    let previous_pages = memory
        .grow(&mut *store, pages)
        .map_err(|e| RuntimeError::context_setup(format!("cannot grow memory: {e}")))?;

    let base = previous_pages * WASM_PAGE_SIZE;
    let handle = u32::try_from(base).map_err(|_| {
        RuntimeError::context_setup(format!("runtime data address {base:#x} exceeds 32 bits"))
    })?;

    let data = RuntimeData::encode(env, gas, base);
    memory
        .write(&mut *store, handle as usize, data.as_bytes())
        .map_err(|e| RuntimeError::context_setup(format!("cannot write runtime data: {e}")))?;

    let ctx = store.data_mut();
    ctx.handle = Some(handle);
    ctx.memory = Some(memory);

    Ok(handle)
}

/// The runtime data block, from its first slot to the end of memory.
pub fn context_block<'a>(
    store: impl Into<StoreContext<'a, ExecutionContext>>,
) -> Result<&'a [u8], HostFunctionError> {
    let store = store.into();
    let (memory, handle) = located(store.data())?;

    let data = memory.data(store);
    data.get(handle as usize..)
        .filter(|block| block.len() >= HEADER_SIZE)
        .ok_or(HostFunctionError::OutOfBounds {
            address: u64::from(handle),
            length: HEADER_SIZE as u64,
        })
}

/// Mutable view of the runtime data block.
pub fn context_block_mut<'a>(
    store: impl Into<StoreContextMut<'a, ExecutionContext>>,
) -> Result<&'a mut [u8], HostFunctionError> {
    let store = store.into();
    let (memory, handle) = located(store.data())?;

    let data = memory.data_mut(store);
    data.get_mut(handle as usize..)
        .filter(|block| block.len() >= HEADER_SIZE)
        .ok_or(HostFunctionError::OutOfBounds {
            address: u64::from(handle),
            length: HEADER_SIZE as u64,
        })
}

fn located(ctx: &ExecutionContext) -> Result<(Memory, u32), HostFunctionError> {
    match (ctx.memory, ctx.handle) {
        (Some(memory), Some(handle)) => Ok((memory, handle)),
        _ => Err(HostFunctionError::ContextDetached),
    }
}

/// Gas left in the runtime data block.
pub fn remaining_gas(store: impl AsContext<Data = ExecutionContext>) -> Result<u64, RuntimeError> {
    let block = context_block(store.as_context())?;
    read_scalar(block, Slot::Gas).ok_or_else(|| {
        RuntimeError::context_setup("runtime data block truncated")
    })
}

/// Copy the return data region designated by the runtime data block.
///
/// # Errors
///
/// Returns `ReturnDataOutOfBounds` if the region does not lie in memory.
pub fn return_data(store: impl AsContext<Data = ExecutionContext>) -> Result<Vec<u8>, RuntimeError> {
    let (memory, _) = located(store.as_context().data())?;
    let block = context_block(store.as_context())?;

    let offset = read_scalar(block, Slot::ReturnDataOffset).unwrap_or_default();
    let size = read_scalar(block, Slot::ReturnDataSize).unwrap_or_default();

    let data = memory.data(store.as_context());
    let out_of_bounds = || RuntimeError::ReturnDataOutOfBounds {
        offset,
        size,
        memory_size: data.len(),
    };

    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = offset
        .checked_add(size)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(out_of_bounds)?;

    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(out_of_bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_data::write_scalar;
    use evmjit_common::EngineConfig;
    use wasmtime::Module;

    fn engine(fuel_metering: bool) -> JitEngine {
        JitEngine::new(&EngineConfig {
            fuel_metering,
            ..Default::default()
        })
        .unwrap()
    }

    fn instantiate(engine: &JitEngine, wat: &str) -> (Store<ExecutionContext>, Instance) {
        let module = Module::new(engine.inner(), wat).unwrap();
        let mut store =
            create_store(engine, &ExecutionConfig::default(), "test".into()).unwrap();
        let instance = Instance::new(&mut store, &module, &[]).unwrap();
        (store, instance)
    }

    #[test]
    fn test_context_creation() {
        let ctx = ExecutionContext::new("run-1".into(), &ExecutionConfig::default());

        assert_eq!(ctx.run_id, "run-1");
        assert!(ctx.handle().is_none());
        assert_eq!(ctx.stack_peak(), 0);
    }

    #[test]
    fn test_record_stack_size_keeps_peak() {
        let mut ctx = ExecutionContext::new("run".into(), &ExecutionConfig::default());

        ctx.record_stack_size(4);
        ctx.record_stack_size(9);
        ctx.record_stack_size(1);

        assert_eq!(ctx.stack_peak(), 9);
    }

    #[test]
    fn test_store_fuel() {
        let engine = engine(true);
        let config = ExecutionConfig {
            max_fuel: 1000,
            ..Default::default()
        };

        let store = create_store(&engine, &config, "test".into()).unwrap();
        assert_eq!(store.get_fuel().ok(), Some(1000));
    }

    #[test]
    fn test_attach_places_block_after_existing_pages() {
        let engine = engine(false);
        let (mut store, instance) = instantiate(&engine, r#"(module (memory (export "memory") 2))"#);

        let env = HostEnvironment::fixture();
        let handle = attach(&mut store, &instance, &env, 500).unwrap();

        assert_eq!(handle, 2 * 65_536);
        assert_eq!(store.data().handle(), Some(handle));
        assert_eq!(remaining_gas(&store).unwrap(), 500);

        write_scalar(context_block_mut(&mut store).unwrap(), Slot::Gas, 42);
        assert_eq!(remaining_gas(&store).unwrap(), 42);

        // No return region designated yet
        assert!(return_data(&store).unwrap().is_empty());
    }

    #[test]
    fn test_attach_without_memory() {
        let engine = engine(false);
        let (mut store, instance) = instantiate(&engine, "(module)");

        let err = attach(&mut store, &instance, &HostEnvironment::default(), 1).unwrap_err();
        assert!(matches!(err, RuntimeError::ContextSetup { .. }));
    }

    #[test]
    fn test_detached_block_access() {
        let engine = engine(false);
        let (store, _) = instantiate(&engine, "(module)");

        assert!(matches!(
            context_block(&store),
            Err(HostFunctionError::ContextDetached)
        ));
    }

    #[test]
    fn test_return_data_out_of_bounds() {
        let engine = engine(false);
        let (mut store, instance) = instantiate(&engine, r#"(module (memory (export "memory") 1))"#);
        attach(&mut store, &instance, &HostEnvironment::default(), 0).unwrap();

        let block = context_block_mut(&mut store).unwrap();
        write_scalar(block, Slot::ReturnDataOffset, u64::MAX);
        write_scalar(block, Slot::ReturnDataSize, 2);

        let err = return_data(&store).unwrap_err();
        assert!(matches!(err, RuntimeError::ReturnDataOutOfBounds { .. }));
    }
}
