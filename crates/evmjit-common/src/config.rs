//! Configuration structures for evmjit.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Backend settings (optimization, target, allocation)
//! - [`ExecutionConfig`]: Per-run settings (entry point, fuel, memory)

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the engine.
/// It can be loaded from TOML or JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Backend configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-run execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Code generation optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations. Code units are small and usually run once, so
    /// build time matters more than run time.
    #[default]
    None,
    /// Optimize for speed.
    Speed,
    /// Optimize for speed and size.
    SpeedAndSize,
}

/// Native backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Optimization level for generated code.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Enable fuel metering as a safety net against runaway code.
    ///
    /// Fuel exhaustion is reported as an out-of-gas termination.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,

    /// Use the pooling allocator instead of on-demand allocation.
    #[serde(default)]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Explicit target triple. Defaults to the host.
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            fuel_metering: defaults::fuel_metering(),
            pooling_allocator: false,
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            target: None,
        }
    }
}

/// Per-run execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Name of the exported entry symbol.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,

    /// Fuel granted to each run when fuel metering is enabled.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Maximum linear memory in megabytes.
    #[serde(default = "defaults::max_memory_mb")]
    pub max_memory_mb: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            entry_point: defaults::entry_point(),
            max_fuel: defaults::max_fuel(),
            max_memory_mb: defaults::max_memory_mb(),
        }
    }
}

impl ExecutionConfig {
    /// Maximum linear memory in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize) * 1024 * 1024
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn fuel_metering() -> bool {
        true
    }

    pub const fn max_instances() -> u32 {
        16
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub fn entry_point() -> String {
        "main".to_string()
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub const fn max_memory_mb() -> u32 {
        128
    }
}
