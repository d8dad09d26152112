//! Runtime functions for evmjit generated code.
//!
//! Generated code calls back into the host for work it cannot do inline.
//! All functions are imported from the `env` module and operate on the
//! [`ExecutionContext`](evmjit_core::ExecutionContext) of the current run.
//!
//! # Functions
//!
//! - `abort`: Abrupt termination, caught by the invoker
//! - [`gas`]: Checked gas deduction against the runtime data block
//! - `stack_size`: Operand stack size reporting for diagnostics
//! - [`logging`]: Guest diagnostics forwarded to `tracing`
//!
//! Use [`linker::register_all`] to install them on a
//! [`BackendBuilder`](evmjit_core::BackendBuilder) linker.

pub mod gas;
pub mod linker;
pub mod logging;

pub use gas::GasHost;
pub use linker::register_all;
pub use logging::LoggingHost;
