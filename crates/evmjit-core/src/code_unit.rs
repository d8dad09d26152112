//! Compiled code units.
//!
//! A [`CodeUnit`] is the artifact produced by the front-end: a WebAssembly
//! module in binary or text form exporting a `main` entry symbol. The unit is
//! immutable; the backend builder takes ownership of it once a backend has
//! been constructed.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use evmjit_common::RuntimeError;

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Encoding of a code unit's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFormat {
    /// WebAssembly binary.
    Binary,
    /// WebAssembly text.
    Text,
}

/// An immutable compiled artifact.
#[derive(Clone)]
pub struct CodeUnit {
    bytes: Arc<[u8]>,
    content_hash: String,
    name: Option<String>,
}

impl CodeUnit {
    /// Wrap raw code unit bytes.
    ///
    /// The bytes are not validated here; invalid units are rejected when the
    /// backend is built.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let content_hash = compute_hash(&bytes);

        Self {
            bytes: bytes.into(),
            content_hash,
            name: None,
        }
    }

    /// Wrap a code unit in WebAssembly text format.
    ///
    /// This is primarily for testing purposes.
    pub fn from_wat(wat: &str) -> Self {
        Self::from_bytes(wat.as_bytes())
    }

    /// Load a code unit from disk.
    ///
    /// The file name becomes the unit's display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        debug!(bytes_len = bytes.len(), "Code unit loaded");

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        Ok(Self {
            name,
            ..Self::from_bytes(bytes)
        })
    }

    /// Attach a display name used in diagnostics.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Detected encoding.
    pub fn format(&self) -> CodeFormat {
        if self.bytes.starts_with(WASM_MAGIC) {
            CodeFormat::Binary
        } else {
            CodeFormat::Text
        }
    }

    /// Hash of the unit's bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Display name, falling back to the content hash.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.content_hash)
    }
}

impl std::fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeUnit")
            .field("name", &self.name())
            .field("format", &self.format())
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    #[test]
    fn test_format_detection() {
        assert_eq!(CodeUnit::from_bytes(MINIMAL_WASM).format(), CodeFormat::Binary);
        assert_eq!(CodeUnit::from_wat("(module)").format(), CodeFormat::Text);
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_name_defaults_to_hash() {
        let unit = CodeUnit::from_bytes(MINIMAL_WASM);
        assert_eq!(unit.name(), unit.content_hash());

        let unit = unit.with_name("empty.wasm");
        assert_eq!(unit.name(), "empty.wasm");
    }

    #[test]
    fn test_from_missing_file() {
        let result = CodeUnit::from_file("/nonexistent/unit.wasm");
        assert!(matches!(result, Err(RuntimeError::Io(_))));
    }

    #[test]
    fn test_clone_shares_bytes() {
        let unit = CodeUnit::from_bytes(MINIMAL_WASM);
        let copy = unit.clone();

        assert_eq!(unit.bytes().as_ptr(), copy.bytes().as_ptr());
    }

    #[test]
    fn test_debug() {
        let unit = CodeUnit::from_bytes(MINIMAL_WASM).with_name("empty");
        let debug_str = format!("{unit:?}");

        assert!(debug_str.contains("CodeUnit"));
        assert!(debug_str.contains("empty"));
    }
}
