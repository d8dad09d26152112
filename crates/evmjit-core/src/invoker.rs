//! Invocation and outcome translation.
//!
//! This module provides [`Invoker`], which runs a built [`Backend`]:
//!
//! 1. Check the entry symbol
//! 2. Instantiate with a fresh execution context and place the runtime data
//! 3. Invoke the entry symbol with the context handle
//! 4. Resolve the raw code from a normal return or an abrupt termination
//! 5. Account gas and extract return data
//!
//! The stack peak of a run is merged into the tracker even when the run
//! fails.

use std::time::{Duration, Instant};

use tracing::{Span, debug, error, field, info, instrument, warn};
use uuid::Uuid;
use wasmtime::Trap;

use evmjit_common::{ExecutionConfig, HostEnvironment, HostFunctionError, RuntimeError};

use crate::backend::Backend;
use crate::context::{self, create_store};
use crate::diagnostics::{StackDepthTracker, hex_dump};
use crate::outcome::{AbruptTermination, TerminationOutcome};

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Why generated code stopped.
    pub outcome: TerminationOutcome,

    /// Return data; empty unless `outcome` is [`TerminationOutcome::Return`].
    pub output: Vec<u8>,

    /// Largest operand stack size reported during this run.
    pub stack_peak: u64,

    /// Wall-clock time spent in generated code.
    pub execution_time: Duration,
}

/// Runs backends against host environments.
///
/// An invoker holds no per-run state; each call to [`Invoker::run`] creates
/// and drops its own [`ExecutionContext`](crate::context::ExecutionContext).
/// The stack tracker is shared with every clone of the invoker.
#[derive(Debug, Clone)]
pub struct Invoker {
    config: ExecutionConfig,
    stack_tracker: StackDepthTracker,
}

impl Invoker {
    /// Create an invoker with its own stack tracker.
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            stack_tracker: StackDepthTracker::new(),
        }
    }

    /// Report stack peaks into `tracker` instead.
    #[must_use]
    pub fn with_stack_tracker(mut self, tracker: StackDepthTracker) -> Self {
        self.stack_tracker = tracker;
        self
    }

    /// Stack peak across all runs of this invoker.
    pub fn stack_tracker(&self) -> &StackDepthTracker {
        &self.stack_tracker
    }

    /// The execution configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run `backend` with `gas` against `env`.
    ///
    /// On success `gas` holds the remaining gas: zero after an out-of-gas
    /// termination, otherwise exactly what generated code left in the context.
    /// On error `gas` is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry symbol is missing or has the wrong signature
    /// - The execution context cannot be set up
    /// - Generated code traps or reports an unknown code
    /// - The return data region lies outside memory
    #[instrument(
        skip_all,
        fields(unit = %backend.code_unit().name(), run_id = field::Empty)
    )]
    pub fn run(
        &self,
        backend: &Backend,
        gas: &mut u64,
        env: &HostEnvironment,
    ) -> Result<RunOutput, RuntimeError> {
        let entry_point = self.config.entry_point.as_str();
        backend.entry_point(entry_point)?;

        let run_id = Uuid::new_v4().to_string();
        Span::current().record("run_id", run_id.as_str());

        let mut store = create_store(backend.engine(), &self.config, run_id)?;

        let instance = backend
            .instance_pre()
            .instantiate(&mut store)
            .map_err(|e| RuntimeError::context_setup(format!("Instantiation failed: {e:#}")))?;

        let handle = context::attach(&mut store, &instance, env, *gas)?;

        let func = instance
            .get_typed_func::<i32, i32>(&mut store, entry_point)
            .map_err(|e| RuntimeError::invalid_entry_point(entry_point, e.to_string()))?;

        debug!(handle, gas = *gas, "Invoking entry point");

        let start = Instant::now();
        #[allow(clippy::cast_possible_wrap)]
        let result = func.call(&mut store, handle as i32);
        let execution_time = start.elapsed();

        info!(duration_us = execution_time.as_micros(), "Execution time");

        let stack_peak = store.data().stack_peak();
        let max_stack_size = self.stack_tracker.record(stack_peak);
        info!(max_stack_size, run_stack_peak = stack_peak, "Max stack size");

        let code = resolve_code(result)?;
        let outcome =
            TerminationOutcome::from_code(code).ok_or(RuntimeError::UnknownReturnCode { code })?;

        let remaining = if outcome.is_out_of_gas() {
            0
        } else {
            context::remaining_gas(&store)?
        };

        let output = if outcome.returns_data() {
            context::return_data(&store)?
        } else {
            Vec::new()
        };

        *gas = remaining;

        if outcome.returns_data() {
            info!(bytes = output.len(), "RETURN {}", hex_dump(&output));
        } else if outcome.is_failure() {
            warn!(code, %outcome, gas_left = remaining, "RETURN {code}");
        } else {
            info!(code, %outcome, gas_left = remaining, "RETURN {code}");
        }

        Ok(RunOutput {
            outcome,
            output,
            stack_peak,
            execution_time,
        })
    }

    /// Run `backend` against [`HostEnvironment::fixture`].
    ///
    /// For standalone execution and tests, when no real host environment
    /// exists.
    pub fn run_standalone(
        &self,
        backend: &Backend,
        gas: &mut u64,
    ) -> Result<RunOutput, RuntimeError> {
        debug!("No host environment supplied, using fixture environment");
        self.run(backend, gas, &HostEnvironment::fixture())
    }
}

/// Turn the entry symbol's result into a raw termination code.
///
/// This is the single place an [`AbruptTermination`] raised inside generated
/// code is caught.
fn resolve_code(result: wasmtime::Result<i32>) -> Result<i32, RuntimeError> {
    let error = match result {
        Ok(code) => return Ok(code),
        Err(error) => error,
    };

    if let Some(signal) = error.downcast_ref::<AbruptTermination>() {
        debug!(code = signal.code(), "Abrupt termination");
        return Ok(signal.code());
    }

    if is_out_of_fuel(&error) {
        warn!("Fuel exhausted, treating as out of gas");
        return Ok(TerminationOutcome::OutOfGas.code());
    }

    match error.downcast::<HostFunctionError>() {
        Ok(host_error) => {
            error!(error = %host_error, "Runtime function failed");
            Err(host_error.into())
        }
        Err(error) => {
            let message = format!("{error:#}");
            error!(trap_message = %message, "Execution trapped");
            Err(RuntimeError::trap(message))
        }
    }
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_normal_return() {
        assert_eq!(resolve_code(Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_resolve_abrupt_termination() {
        let error = wasmtime::Error::new(AbruptTermination::new(104));
        assert_eq!(resolve_code(Err(error)).unwrap(), 104);
    }

    #[test]
    fn test_resolve_abrupt_termination_with_context() {
        let error = wasmtime::Error::new(AbruptTermination::new(2)).context("wasm backtrace");
        assert_eq!(resolve_code(Err(error)).unwrap(), 2);
    }

    #[test]
    fn test_resolve_out_of_fuel() {
        let error = wasmtime::Error::new(Trap::OutOfFuel);
        assert_eq!(
            resolve_code(Err(error)).unwrap(),
            TerminationOutcome::OutOfGas.code()
        );
    }

    #[test]
    fn test_resolve_trap() {
        let error = wasmtime::Error::new(Trap::UnreachableCodeReached);
        let err = resolve_code(Err(error)).unwrap_err();
        assert!(matches!(err, RuntimeError::Trap { .. }));
    }

    #[test]
    fn test_resolve_host_function_error() {
        let error = wasmtime::Error::new(HostFunctionError::ContextDetached);
        let err = resolve_code(Err(error)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::HostFunction(HostFunctionError::ContextDetached)
        ));
    }

    #[test]
    fn test_invoker_shares_tracker() {
        let tracker = StackDepthTracker::new();
        let invoker = Invoker::new(ExecutionConfig::default()).with_stack_tracker(tracker.clone());

        invoker.stack_tracker().record(3);
        assert_eq!(tracker.peak(), 3);
        assert_eq!(invoker.config().entry_point, "main");
    }
}
