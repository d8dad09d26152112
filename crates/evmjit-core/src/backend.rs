//! Backend construction.
//!
//! [`BackendBuilder`] turns a [`CodeUnit`] into a ready-to-invoke [`Backend`]:
//!
//! 1. Compile the unit with the [`JitEngine`]
//! 2. Reject units whose exported memory cannot grow
//! 3. Take ownership of the unit
//! 4. Finalize: resolve imports against the runtime-function linker so that
//!    instantiation per run is a cheap copy
//!
//! If any step fails, the unit is handed back to the caller
//! inside [`BuildFailure`].

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument};
use wasmtime::{ExternType, InstancePre, Linker, Module, ValType};

use evmjit_common::RuntimeError;

use crate::context::{ExecutionContext, MEMORY_EXPORT};
use crate::{CodeUnit, JitEngine};

/// Backend construction failed; the code unit is returned to the caller.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct BuildFailure {
    #[source]
    error: RuntimeError,
    unit: CodeUnit,
}

impl BuildFailure {
    fn new(message: String, unit: CodeUnit) -> Self {
        Self {
            error: RuntimeError::engine_construction_failed(message),
            unit,
        }
    }

    /// The construction error.
    pub fn error(&self) -> &RuntimeError {
        &self.error
    }

    /// Recover the code unit.
    pub fn into_code_unit(self) -> CodeUnit {
        self.unit
    }
}

/// Builds backends for code units.
///
/// Runtime functions that generated code imports are registered on the
/// linker before building; see `evmjit_host::linker::register_all`.
pub struct BackendBuilder {
    engine: JitEngine,
    linker: Linker<ExecutionContext>,
}

impl BackendBuilder {
    /// Create a builder with an empty linker.
    pub fn new(engine: &JitEngine) -> Self {
        Self {
            engine: engine.clone(),
            linker: Linker::new(engine.inner()),
        }
    }

    /// Get a mutable reference to the linker.
    ///
    /// Use this to register runtime functions.
    pub fn linker_mut(&mut self) -> &mut Linker<ExecutionContext> {
        &mut self.linker
    }

    /// The engine backends are built with.
    pub fn engine(&self) -> &JitEngine {
        &self.engine
    }

    /// Build a backend for `unit`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildFailure`] carrying `EngineConstructionFailed` and the
    /// unit if the unit cannot be compiled or its imports cannot be resolved.
    #[instrument(skip(self, unit), fields(unit = %unit.name()))]
    pub fn build(&self, unit: CodeUnit) -> Result<Backend, BuildFailure> {
        let compile_start = Instant::now();

        let module = match Module::new(self.engine.inner(), unit.bytes()) {
            Ok(module) => module,
            Err(e) => {
                return Err(BuildFailure::new(
                    format!("Compilation of '{}' failed: {e:#}", unit.name()),
                    unit,
                ));
            }
        };

        debug!(
            duration_us = compile_start.elapsed().as_micros(),
            "Code unit compiled"
        );

        if let Err(reason) = check_memory(&module) {
            return Err(BuildFailure::new(
                format!("Code unit '{}' rejected: {reason}", unit.name()),
                unit,
            ));
        }

        let finalization_start = Instant::now();
        let pre = match self.linker.instantiate_pre(&module) {
            Ok(pre) => pre,
            Err(e) => {
                return Err(BuildFailure::new(
                    format!("Finalization of '{}' failed: {e:#}", unit.name()),
                    unit,
                ));
            }
        };
        let finalization_time = finalization_start.elapsed();

        info!(
            duration_us = finalization_time.as_micros(),
            "Module finalization time"
        );

        Ok(Backend {
            engine: self.engine.clone(),
            unit,
            module,
            pre,
            finalization_time,
        })
    }
}

/// The runtime data block is placed in pages grown past the unit's own
/// memory, so an exported memory must be able to grow.
fn check_memory(module: &Module) -> Result<(), String> {
    let Some(ExternType::Memory(memory)) = module.get_export(MEMORY_EXPORT) else {
        return Ok(());
    };

    match memory.maximum() {
        Some(maximum) if maximum <= memory.minimum() => Err(format!(
            "memory export '{MEMORY_EXPORT}' is fixed at {maximum} pages, \
             no room for the runtime data block"
        )),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for BackendBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBuilder")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// A finalized code unit, ready to be invoked.
pub struct Backend {
    engine: JitEngine,
    unit: CodeUnit,
    module: Module,
    pre: InstancePre<ExecutionContext>,
    finalization_time: Duration,
}

impl Backend {
    /// The code unit this backend owns.
    pub fn code_unit(&self) -> &CodeUnit {
        &self.unit
    }

    /// The engine the unit was compiled with.
    pub fn engine(&self) -> &JitEngine {
        &self.engine
    }

    /// Time spent finalizing generated code.
    pub fn finalization_time(&self) -> Duration {
        self.finalization_time
    }

    pub(crate) fn instance_pre(&self) -> &InstancePre<ExecutionContext> {
        &self.pre
    }

    /// Check that `symbol` is exported as `(i32) -> i32`.
    ///
    /// # Errors
    ///
    /// Returns `EntryPointNotFound` if the export is missing and
    /// `InvalidEntryPoint` if it is not a function of that shape.
    pub fn entry_point(&self, symbol: &str) -> Result<(), RuntimeError> {
        let Some(export) = self.module.get_export(symbol) else {
            return Err(RuntimeError::entry_point_not_found(symbol));
        };

        let ExternType::Func(func) = export else {
            return Err(RuntimeError::invalid_entry_point(symbol, "export is not a function"));
        };

        let params: Vec<ValType> = func.params().collect();
        let results: Vec<ValType> = func.results().collect();
        let takes_handle = matches!(params.as_slice(), [ValType::I32]);
        let returns_code = matches!(results.as_slice(), [ValType::I32]);

        if takes_handle && returns_code {
            Ok(())
        } else {
            Err(RuntimeError::invalid_entry_point(
                symbol,
                format!("expected (i32) -> i32, found {func:?}"),
            ))
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("unit", &self.unit)
            .field("finalization_time", &self.finalization_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmjit_common::EngineConfig;

    fn builder() -> BackendBuilder {
        let engine = JitEngine::new(&EngineConfig::default()).unwrap();
        BackendBuilder::new(&engine)
    }

    #[test]
    fn test_build_valid_unit() {
        let unit = CodeUnit::from_wat(
            r#"(module (func (export "main") (param i32) (result i32) i32.const 0))"#,
        );

        let backend = builder().build(unit).unwrap();
        assert!(backend.entry_point("main").is_ok());
    }

    #[test]
    fn test_build_failure_returns_unit() {
        let unit = CodeUnit::from_bytes(b"\0asm\x01\0\0\0garbage".to_vec());
        let hash = unit.content_hash().to_string();

        let failure = builder().build(unit).unwrap_err();
        assert!(failure.error().is_construction_failure());
        assert!(!failure.to_string().is_empty());

        let unit = failure.into_code_unit();
        assert_eq!(unit.content_hash(), hash);
    }

    #[test]
    fn test_unresolved_import_fails_finalization() {
        let unit = CodeUnit::from_wat(
            r#"(module (import "env" "missing" (func)) (func (export "main") (param i32) (result i32) i32.const 0))"#,
        );

        let failure = builder().build(unit).unwrap_err();
        assert!(failure.error().to_string().contains("Finalization"));
    }

    #[test]
    fn test_fixed_size_memory_rejected() {
        let unit = CodeUnit::from_wat(
            r#"(module
                (memory (export "memory") 1 1)
                (func (export "main") (param i32) (result i32) i32.const 0))"#,
        );

        let failure = builder().build(unit).unwrap_err();
        assert!(failure.error().is_construction_failure());
        assert!(failure.to_string().contains("fixed at 1 pages"));
    }

    #[test]
    fn test_bounded_memory_with_headroom_accepted() {
        let unit = CodeUnit::from_wat(
            r#"(module
                (memory (export "memory") 1 4)
                (func (export "main") (param i32) (result i32) i32.const 0))"#,
        );

        assert!(builder().build(unit).is_ok());
    }

    #[test]
    fn test_entry_point_missing() {
        let backend = builder()
            .build(CodeUnit::from_wat("(module)"))
            .unwrap();

        let err = backend.entry_point("main").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_entry_point_wrong_signature() {
        let backend = builder()
            .build(CodeUnit::from_wat(r#"(module (func (export "main")))"#))
            .unwrap();

        let err = backend.entry_point("main").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidEntryPoint { .. }));
    }

    #[test]
    fn test_entry_point_not_a_function() {
        let backend = builder()
            .build(CodeUnit::from_wat(r#"(module (memory (export "main") 1))"#))
            .unwrap();

        let err = backend.entry_point("main").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidEntryPoint { .. }));
    }
}
