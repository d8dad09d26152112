//! Common types, errors, and configuration for evmjit.
//!
//! This crate provides shared functionality used across the evmjit workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for backend and run settings
//! - Host environment values consumed by generated code

pub mod config;
pub mod config_file;
pub mod env;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, OptLevel, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use env::{Address, HostEnvironment, ParseHexError, Word};
pub use error::{HostFunctionError, RuntimeError};
