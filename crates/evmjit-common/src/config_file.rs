//! Configuration file structures for evmjit.
//!
//! A [`ConfigFile`] bundles the runtime configuration with an optional host
//! environment, so a code unit can be run from the command line against
//! fully specified account, block and call data.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{HostEnvironment, RuntimeConfig};

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// opt_level = "none"
/// fuel_metering = true
///
/// [runtime.execution]
/// entry_point = "main"
/// max_fuel = 10_000_000
///
/// [environment]
/// address = "0x0f"
/// caller = "0xfacefacefaceface"
/// call_data = "0x48656c6c6f"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine + execution settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Host environment to run against.
    #[serde(default)]
    pub environment: Option<HostEnvironment>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
