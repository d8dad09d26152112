//! Backend builder and invoker for evmjit code units.
//!
//! This crate runs compiled EVM code units on a native JIT backend:
//! - [`JitEngine`]: Configured Cranelift engine bound to the native target
//! - [`CodeUnit`]: Immutable compiled artifact with a `main` entry symbol
//! - [`BackendBuilder`] / [`Backend`]: Compilation and finalization of a unit
//! - [`Invoker`]: Runs a backend and translates how it terminated
//! - [`ExecutionContext`]: Per-run state shared with generated code
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      JitEngine                          │
//! │  (Shared, thread-safe)                                  │
//! │  - Native target + object format fixup                  │
//! │  - Optimizations off, optional fuel safety net          │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 BackendBuilder → Backend                │
//! │  - Owns the CodeUnit once built                         │
//! │  - Imports resolved against runtime functions           │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │         Invoker: Store<ExecutionContext> per run        │
//! │  - Runtime data block in linear memory                  │
//! │  - main(handle) → code, or abort(code) → code           │
//! │  - Gas accounting, return data, diagnostics             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod code_unit;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod invoker;
pub mod outcome;
pub mod runtime_data;
pub mod target;

pub use backend::{Backend, BackendBuilder, BuildFailure};
pub use code_unit::{CodeFormat, CodeUnit};
pub use context::ExecutionContext;
pub use diagnostics::StackDepthTracker;
pub use engine::JitEngine;
pub use invoker::{Invoker, RunOutput};
pub use outcome::{AbruptTermination, TerminationOutcome};
pub use target::{NativeTarget, native_target};
