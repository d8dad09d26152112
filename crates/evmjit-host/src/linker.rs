//! Runtime function registration for backend linkers.
//!
//! Generated code imports every runtime function from the `env` module. The
//! linker must have all of them registered before a code unit is built,
//! otherwise finalization fails on the unresolved import.

use evmjit_common::{HostFunctionError, RuntimeError};
use evmjit_core::context::{MEMORY_EXPORT, context_block_mut};
use evmjit_core::{AbruptTermination, ExecutionContext};
use tracing::{trace, warn};
use wasmtime::{Caller, Linker};

use crate::gas::GasHost;
use crate::logging::{LoggingHost, level_from_i32};

/// Import module of every runtime function.
pub const RUNTIME_MODULE: &str = "env";

/// Register all runtime functions on a backend linker.
///
/// This registers:
/// - `env::abort` - Abrupt termination with a raw code
/// - `env::consume_gas` - Checked gas deduction
/// - `env::stack_size` - Operand stack size reporting
/// - `env::log` - Logging function for generated code
///
/// # Errors
///
/// Returns an error if function registration fails.
pub fn register_all(linker: &mut Linker<ExecutionContext>) -> Result<(), RuntimeError> {
    register_abort(linker)?;
    register_gas(linker)?;
    register_stack_size(linker)?;
    register_logging(linker)?;
    Ok(())
}

fn registration_failed(name: &str, error: &wasmtime::Error) -> RuntimeError {
    RuntimeError::invalid_config(format!("Failed to register {name} function: {error}"))
}

/// Register `env::abort(code: i32)`.
///
/// Never returns to generated code: the call unwinds every generated frame
/// with an [`AbruptTermination`] carrying `code`.
pub fn register_abort(linker: &mut Linker<ExecutionContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            RUNTIME_MODULE,
            "abort",
            |caller: Caller<'_, ExecutionContext>, code: i32| -> wasmtime::Result<()> {
                trace!(run_id = %caller.data().run_id, code, "abort");
                Err(wasmtime::Error::new(AbruptTermination::new(code)))
            },
        )
        .map_err(|e| registration_failed("abort", &e))?;

    Ok(())
}

/// Register `env::consume_gas(amount: i64)`.
pub fn register_gas(linker: &mut Linker<ExecutionContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            RUNTIME_MODULE,
            "consume_gas",
            |mut caller: Caller<'_, ExecutionContext>, amount: i64| -> wasmtime::Result<()> {
                let block = context_block_mut(&mut caller).map_err(wasmtime::Error::new)?;
                GasHost::consume(block, amount).map_err(wasmtime::Error::new)?;
                Ok(())
            },
        )
        .map_err(|e| registration_failed("consume_gas", &e))?;

    Ok(())
}

/// Register `env::stack_size(size: i32)`.
///
/// A negative size is a bug in the generated code and traps the run.
pub fn register_stack_size(linker: &mut Linker<ExecutionContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            RUNTIME_MODULE,
            "stack_size",
            |mut caller: Caller<'_, ExecutionContext>, size: i32| -> wasmtime::Result<()> {
                let size = u64::try_from(size).map_err(|_| {
                    wasmtime::Error::new(HostFunctionError::InvalidArgument {
                        reason: format!("negative stack size {size}"),
                    })
                })?;
                caller.data_mut().record_stack_size(size);
                Ok(())
            },
        )
        .map_err(|e| registration_failed("stack_size", &e))?;

    Ok(())
}

/// Register `env::log(level: i32, ptr: i32, len: i32)`.
///
/// # Memory Protocol
///
/// - `level`: Log level (0=debug, 1=info, 2=warn, 3=error)
/// - `ptr`: Address of the message in linear memory
/// - `len`: Length of the message in bytes (UTF-8)
///
/// Malformed arguments are logged and ignored; logging never fails a run.
pub fn register_logging(linker: &mut Linker<ExecutionContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            RUNTIME_MODULE,
            "log",
            |mut caller: Caller<'_, ExecutionContext>, level: i32, ptr: i32, len: i32| {
                let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                    warn!(ptr, len, "Invalid pointer or length (negative value)");
                    return;
                };

                let Some(memory) = caller
                    .get_export(MEMORY_EXPORT)
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("Memory export not found in code unit");
                    return;
                };

                let data = memory.data(&caller);
                let Some(bytes) = start
                    .checked_add(len)
                    .and_then(|end| data.get(start..end))
                else {
                    warn!(start, len, memory_size = data.len(), "Memory access out of bounds");
                    return;
                };

                let message = String::from_utf8_lossy(bytes);
                LoggingHost::log(caller.data(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| registration_failed("log", &e))?;

    Ok(())
}
