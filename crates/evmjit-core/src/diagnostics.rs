//! Run diagnostics shared across invocations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Peak operand stack size observed across runs.
///
/// Clones share the same counter, so one tracker can be injected into every
/// invoker of a process (or of a test) without global state.
#[derive(Debug, Clone, Default)]
pub struct StackDepthTracker {
    peak: Arc<AtomicU64>,
}

impl StackDepthTracker {
    /// Create a tracker starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the peak of one run and return the overall peak.
    pub fn record(&self, depth: u64) -> u64 {
        let previous = self.peak.fetch_max(depth, Ordering::Relaxed);
        previous.max(depth)
    }

    /// Overall peak so far.
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }
}

/// Format bytes as a space separated hex dump, e.g. `[ de ad ]`.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + 3);
    out.push_str("[ ");
    for byte in bytes {
        out.push_str(&hex::encode([*byte]));
        out.push(' ');
    }
    out.push(']');
    out
}
