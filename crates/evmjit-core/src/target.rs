//! Native target registration.
//!
//! The backend compiles for a target descriptor derived from the host triple.
//! Detection runs once per process; later calls return the cached descriptor.
//!
//! On Windows the JIT's relocation model does not handle COFF objects, so the
//! descriptor's binary format is forced to ELF. Wasmtime already emits ELF for
//! its code on every platform, so the override is recorded and logged but only
//! an explicitly requested cross target is ever handed to the backend config.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use target_lexicon::{BinaryFormat, OperatingSystem, Triple};
use tracing::info;

use evmjit_common::RuntimeError;

static NATIVE_TARGET: OnceLock<NativeTarget> = OnceLock::new();

/// Target descriptor handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTarget {
    requested: Triple,
    triple: Triple,
}

impl NativeTarget {
    /// Build a descriptor for `triple`, applying the object format fixup.
    pub fn for_triple(triple: Triple) -> Self {
        if triple.operating_system == OperatingSystem::Windows {
            Self::with_object_format(triple, BinaryFormat::Elf)
        } else {
            Self {
                requested: triple.clone(),
                triple,
            }
        }
    }

    /// Build a descriptor for `triple` whose object format is `format`.
    pub fn with_object_format(requested: Triple, format: BinaryFormat) -> Self {
        let mut triple = requested.clone();
        triple.binary_format = format;
        Self { requested, triple }
    }

    /// Parse an explicit triple string and build its descriptor.
    pub fn parse(triple: &str) -> Result<Self, RuntimeError> {
        let triple = Triple::from_str(triple).map_err(|e| {
            RuntimeError::engine_construction_failed(format!("Invalid target '{triple}': {e}"))
        })?;
        Ok(Self::for_triple(triple))
    }

    /// The final target triple.
    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    /// The triple as requested, before the object format fixup.
    pub fn requested(&self) -> &Triple {
        &self.requested
    }

    /// Whether the object format was rewritten.
    pub fn object_format_overridden(&self) -> bool {
        self.triple.binary_format != self.requested.binary_format
    }

    /// Whether the requested triple is a cross target.
    ///
    /// The object format override alone never makes a target foreign.
    pub fn differs_from_host(&self) -> bool {
        self.requested != Triple::host()
    }
}

impl fmt::Display for NativeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.triple, f)
    }
}

/// Register the host as the native target.
///
/// Safe to call from every engine construction; detection happens once.
pub fn native_target() -> &'static NativeTarget {
    NATIVE_TARGET.get_or_init(|| {
        let target = NativeTarget::for_triple(Triple::host());
        info!(
            triple = %target,
            object_format_overridden = target.object_format_overridden(),
            "Native target registered"
        );
        target
    })
}
