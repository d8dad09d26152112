//! JIT execution engine for compiled EVM code units.
//!
//! [`ExecutionEngine`] ties the pieces together: a [`JitEngine`] bound to the
//! native target, a [`BackendBuilder`] with every runtime function linked, and
//! an [`Invoker`] that reports stack peaks into a shared tracker.
//!
//! ```no_run
//! use evmjit::{CodeUnit, ExecutionEngine, RuntimeConfig};
//!
//! let engine = ExecutionEngine::new(&RuntimeConfig::default())?;
//! let unit = CodeUnit::from_file("contract.wasm")?;
//!
//! let mut gas = 100_000;
//! let output = engine.run(unit, &mut gas, None)?;
//! println!("{} with {gas} gas left", output.outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;
use tracing::{debug, info, instrument};

pub use evmjit_common::{
    Address, ConfigFile, EngineConfig, ExecutionConfig, HostEnvironment, OptLevel, RuntimeConfig,
    RuntimeError, Word,
};
pub use evmjit_core::{
    Backend, BackendBuilder, BuildFailure, CodeUnit, Invoker, JitEngine, RunOutput,
    StackDepthTracker, TerminationOutcome,
};

/// Error returned by [`ExecutionEngine::run`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// The code unit could not be turned into a backend.
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// The run failed after the backend was built.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl EngineError {
    /// The underlying runtime error.
    pub fn runtime_error(&self) -> &RuntimeError {
        match self {
            Self::Build(failure) => failure.error(),
            Self::Runtime(error) => error,
        }
    }

    /// Recover the code unit if construction failed.
    pub fn into_code_unit(self) -> Option<CodeUnit> {
        match self {
            Self::Build(failure) => Some(failure.into_code_unit()),
            Self::Runtime(_) => None,
        }
    }
}

/// Builds and runs code units.
#[derive(Debug)]
pub struct ExecutionEngine {
    builder: BackendBuilder,
    invoker: Invoker,
}

impl ExecutionEngine {
    /// Create an engine from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the native engine cannot be constructed or the
    /// runtime functions cannot be linked.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let engine = JitEngine::new(&config.engine)?;

        let mut builder = BackendBuilder::new(&engine);
        evmjit_host::register_all(builder.linker_mut())?;

        let invoker = Invoker::new(config.execution.clone());

        info!(target = %engine.target(), "Execution engine ready");

        Ok(Self { builder, invoker })
    }

    /// Compile and finalize `unit`.
    pub fn build(&self, unit: CodeUnit) -> Result<Backend, BuildFailure> {
        self.builder.build(unit)
    }

    /// Run an already built backend.
    ///
    /// Without a host environment the fixture environment is used.
    pub fn run_backend(
        &self,
        backend: &Backend,
        gas: &mut u64,
        env: Option<&HostEnvironment>,
    ) -> Result<RunOutput, RuntimeError> {
        match env {
            Some(env) => self.invoker.run(backend, gas, env),
            None => self.invoker.run_standalone(backend, gas),
        }
    }

    /// Build `unit` and run it once.
    ///
    /// `gas` is updated only when the run succeeds. If the unit cannot be
    /// built it is handed back inside [`EngineError::Build`].
    #[instrument(skip_all, fields(unit = %unit.name(), gas = *gas))]
    pub fn run(
        &self,
        unit: CodeUnit,
        gas: &mut u64,
        env: Option<&HostEnvironment>,
    ) -> Result<RunOutput, EngineError> {
        let backend = self.build(unit)?;
        debug!(finalization_us = backend.finalization_time().as_micros(), "Backend ready");

        Ok(self.run_backend(&backend, gas, env)?)
    }

    /// Largest stack size reported by any run of this engine.
    pub fn max_stack_size(&self) -> u64 {
        self.invoker.stack_tracker().peak()
    }

    /// The shared stack tracker.
    pub fn stack_tracker(&self) -> &StackDepthTracker {
        self.invoker.stack_tracker()
    }
}
