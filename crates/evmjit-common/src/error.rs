//! Error types for evmjit.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`RuntimeError`]: Top-level errors for building and running code units
//! - [`HostFunctionError`]: Errors from runtime functions called by generated code
//!
//! Termination reasons reported by generated code (stop, return, out of gas, ...)
//! are *not* errors; they are returned as a termination outcome.

use std::io;

use thiserror::Error;

/// Top-level runtime errors.
///
/// These errors represent failures of the engine itself, from backend
/// construction to interpreting what generated code left behind.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The native backend could not be built for the code unit or target.
    #[error("Engine construction failed: {message}")]
    EngineConstructionFailed {
        /// Diagnostic message from the backend.
        message: String,
    },

    /// The code unit does not export the required entry symbol.
    #[error("Entry point not found: {symbol}")]
    EntryPointNotFound {
        /// Name of the missing entry symbol.
        symbol: String,
    },

    /// The entry symbol exists but cannot be invoked with a context handle.
    #[error("Invalid entry point '{symbol}': {reason}")]
    InvalidEntryPoint {
        /// Name of the entry symbol.
        symbol: String,
        /// Why the export was rejected.
        reason: String,
    },

    /// The execution context could not be set up for the instance.
    #[error("Execution context setup failed: {reason}")]
    ContextSetup {
        /// Description of the setup failure.
        reason: String,
    },

    /// Generated code terminated with a code outside the known outcomes.
    #[error("Unknown return code: {code}")]
    UnknownReturnCode {
        /// The raw code.
        code: i32,
    },

    /// The return data region designated by the context lies outside memory.
    #[error("Return data out of bounds: offset {offset}, size {size}, memory size {memory_size}")]
    ReturnDataOutOfBounds {
        /// Start address of the region.
        offset: u64,
        /// Length of the region.
        size: u64,
        /// Size of linear memory in bytes.
        memory_size: usize,
    },

    /// A native trap occurred during execution.
    #[error("Native trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A runtime function failed.
    #[error("Host function error: {0}")]
    HostFunction(#[from] HostFunctionError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from runtime functions called by generated code.
#[derive(Error, Debug)]
pub enum HostFunctionError {
    /// A runtime function was called before the context handle was placed.
    #[error("Execution context not attached")]
    ContextDetached,

    /// A runtime function accessed memory outside the linear memory.
    #[error("Memory access out of bounds: address {address}, length {length}")]
    OutOfBounds {
        /// Start address.
        address: u64,
        /// Access length.
        length: u64,
    },

    /// Invalid argument was passed to a runtime function.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `EngineConstructionFailed` error.
    pub fn engine_construction_failed(message: impl Into<String>) -> Self {
        Self::EngineConstructionFailed {
            message: message.into(),
        }
    }

    /// Create a new `EntryPointNotFound` error.
    pub fn entry_point_not_found(symbol: impl Into<String>) -> Self {
        Self::EntryPointNotFound {
            symbol: symbol.into(),
        }
    }

    /// Create a new `InvalidEntryPoint` error.
    pub fn invalid_entry_point(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntryPoint {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `ContextSetup` error.
    pub fn context_setup(reason: impl Into<String>) -> Self {
        Self::ContextSetup {
            reason: reason.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the backend could not be constructed.
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::EngineConstructionFailed { .. })
    }

    /// Returns `true` if the entry symbol was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryPointNotFound { .. })
    }
}
