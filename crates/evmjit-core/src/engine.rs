//! Native backend configuration and creation.
//!
//! The [`JitEngine`] is the compilation half of the backend builder. It is:
//! - Configured for fast builds (optimizations off by default)
//! - Bound to the native target, with the platform object format fixup
//! - Optionally fuel-metered as a safety net against runaway code

use std::sync::Arc;

use tracing::{debug, info};
use wasmtime::{Config, Engine, InstanceAllocationStrategy, PoolingAllocationConfig};

use evmjit_common::{EngineConfig, OptLevel, RuntimeError};

use crate::target::{NativeTarget, native_target};

/// Thread-safe JIT engine wrapper.
///
/// Wraps a Wasmtime [`Engine`] using the Cranelift JIT. The engine holds no
/// per-run state and can back any number of code units.
///
/// # Example
///
/// ```ignore
/// use evmjit_common::EngineConfig;
/// use evmjit_core::JitEngine;
///
/// let engine = JitEngine::new(&EngineConfig::default())?;
/// ```
#[derive(Clone)]
pub struct JitEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
    target: NativeTarget,
}

impl JitEngine {
    /// Create a new JIT engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineConstructionFailed` if the target is invalid or the
    /// backend rejects the configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, RuntimeError> {
        let target = match config.target.as_deref() {
            Some(triple) => NativeTarget::parse(triple)?,
            None => native_target().clone(),
        };

        Self::with_target(config, target)
    }

    /// Create a JIT engine for an already resolved target descriptor.
    ///
    /// Only a cross target reaches the backend configuration; an object
    /// format override on the host triple is left to Wasmtime, which emits
    /// ELF for its code everywhere.
    ///
    /// # Errors
    ///
    /// Returns `EngineConstructionFailed` if the backend rejects the
    /// configuration.
    pub fn with_target(config: &EngineConfig, target: NativeTarget) -> Result<Self, RuntimeError> {
        let mut wasmtime_config = Config::new();

        wasmtime_config.cranelift_opt_level(match config.opt_level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });

        wasmtime_config.consume_fuel(config.fuel_metering);

        if target.differs_from_host() {
            wasmtime_config
                .target(&target.requested().to_string())
                .map_err(|e| {
                    RuntimeError::engine_construction_failed(format!(
                        "Unsupported target '{target}': {e}"
                    ))
                })?;
        }

        if config.pooling_allocator {
            let pooling_config = Self::create_pooling_config(config);

            wasmtime_config
                .allocation_strategy(InstanceAllocationStrategy::Pooling(pooling_config));

            info!(
                max_instances = config.max_instances,
                instance_memory_mb = config.instance_memory_mb,
                "Pooling allocator enabled"
            );
        } else {
            wasmtime_config.allocation_strategy(InstanceAllocationStrategy::OnDemand);
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            RuntimeError::engine_construction_failed(format!("Failed to create JIT engine: {e}"))
        })?;

        debug!(
            target = %target,
            cross_target = target.differs_from_host(),
            opt_level = ?config.opt_level,
            fuel_metering = config.fuel_metering,
            "JIT engine initialized"
        );

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
            target,
        })
    }

    /// Create pooling allocation configuration.
    fn create_pooling_config(config: &EngineConfig) -> PoolingAllocationConfig {
        let mut pooling = PoolingAllocationConfig::default();

        pooling.total_core_instances(config.max_instances);
        pooling.total_memories(config.max_instances);
        pooling.total_tables(config.max_instances);

        let max_memory_bytes = (config.instance_memory_mb as usize) * 1024 * 1024;
        pooling.max_memory_size(max_memory_bytes);

        pooling
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Target descriptor the engine compiles for.
    pub fn target(&self) -> &NativeTarget {
        &self.target
    }

    /// Check if fuel metering is enabled.
    pub fn is_fuel_metered(&self) -> bool {
        self.config.fuel_metering
    }
}

impl std::fmt::Debug for JitEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitEngine")
            .field("target", &self.target.to_string())
            .field("opt_level", &self.config.opt_level)
            .field("fuel_metering", &self.config.fuel_metering)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation_default() {
        let engine = JitEngine::new(&EngineConfig::default());

        assert!(engine.is_ok());
        let engine = engine.unwrap();
        assert!(engine.is_fuel_metered());
        assert_eq!(engine.target(), native_target());
    }

    #[test]
    fn test_engine_creation_pooling() {
        let config = EngineConfig {
            pooling_allocator: true,
            max_instances: 4,
            instance_memory_mb: 4,
            ..Default::default()
        };

        assert!(JitEngine::new(&config).is_ok());
    }

    #[test]
    fn test_engine_creation_without_fuel() {
        let config = EngineConfig {
            fuel_metering: false,
            opt_level: OptLevel::Speed,
            ..Default::default()
        };
        let engine = JitEngine::new(&config).unwrap();

        assert!(!engine.is_fuel_metered());
    }

    #[test]
    fn test_engine_invalid_target() {
        let config = EngineConfig {
            target: Some("not-a-triple".into()),
            ..Default::default()
        };

        let err = JitEngine::new(&config).unwrap_err();
        assert!(err.is_construction_failure());
        assert!(err.to_string().contains("not-a-triple"));
    }

    #[test]
    fn test_format_override_builds_and_runs() {
        use crate::{BackendBuilder, CodeUnit, Invoker, TerminationOutcome};
        use evmjit_common::ExecutionConfig;
        use target_lexicon::{BinaryFormat, Triple};

        let format = if Triple::host().binary_format == BinaryFormat::Coff {
            BinaryFormat::Elf
        } else {
            BinaryFormat::Coff
        };
        let target = NativeTarget::with_object_format(Triple::host(), format);
        assert!(target.object_format_overridden());

        let engine = JitEngine::with_target(&EngineConfig::default(), target).unwrap();
        let backend = BackendBuilder::new(&engine)
            .build(CodeUnit::from_wat(
                r#"(module
                    (memory (export "memory") 1)
                    (func (export "main") (param i32) (result i32) i32.const 0))"#,
            ))
            .unwrap();

        let mut gas = 21;
        let output = Invoker::new(ExecutionConfig::default())
            .run_standalone(&backend, &mut gas)
            .unwrap();

        assert_eq!(output.outcome, TerminationOutcome::Stop);
        assert_eq!(gas, 21);
    }

    #[test]
    fn test_engine_debug() {
        let engine = JitEngine::new(&EngineConfig::default()).unwrap();

        let debug_str = format!("{engine:?}");
        assert!(debug_str.contains("JitEngine"));
        assert!(debug_str.contains("target"));
    }
}
